use crate::token::Token;

/// Renders tokens back into C source.
///
/// Source lines are kept where the tokens carry locations, and tokens that
/// touched in the source are printed touching. Every preprocessor directive
/// is printed on a line of its own, with any continuation lines joined. An
/// unclosed quote always ends its line.
pub fn reconstruct_source(tokens: &[Token]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut prev: Option<&Token> = None;
    // End line of the last token that had a location
    let mut last_line = None;

    for token in tokens {
        let new_line = match prev {
            None => true,
            Some(prev) if prev.directive != token.directive => true,
            Some(_) if token.in_directive() => false,
            Some(prev) if prev.runs_to_end_of_line() => true,
            Some(_) => match (token.span, last_line) {
                (Some(span), Some(line)) => span.start.line != line,
                _ => false,
            },
        };

        if new_line {
            lines.push(String::new());
        }
        if let Some(line) = lines.last_mut() {
            let glued = prev.map_or(false, |prev| token.is_adjacent_to(prev));
            if !line.is_empty() && !glued {
                line.push(' ');
            }
            line.push_str(&token.spelling);
        }

        if let Some(span) = token.span {
            last_line = Some(span.end.line);
        }
        prev = Some(token);
    }

    let mut out = lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
