//! Export filename templating.
//!
//! Three tokens: `{orig}` (original basename, no extension), `{seq:N}`
//! (sequence number zero-padded to `N` digits), `{date}` (ISO
//! `YYYY-MM-DD` from capture timestamp or file mtime). An unknown token
//! is a configuration error, not a silently-dropped one.

use crate::error::{EngineError, Result};

pub const DEFAULT_TEMPLATE: &str = "{orig}_{seq:4}";

/// The substitution values available to one filename render.
pub struct TemplateContext<'a> {
    pub orig: &'a str,
    pub seq: u32,
    /// ISO `YYYY-MM-DD`, already resolved from capture timestamp or mtime
    /// by the caller.
    pub date: &'a str,
}

/// Renders `template` against `ctx`, returning the filename stem (the
/// caller appends the export extension).
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut token = String::new();
        let mut closed = false;
        for (_, c2) in chars.by_ref() {
            if c2 == '}' {
                closed = true;
                break;
            }
            token.push(c2);
        }
        if !closed {
            return Err(EngineError::Internal(format!(
                "unterminated template token in `{template}`"
            )));
        }
        out.push_str(&render_token(&token, ctx)?);
    }

    Ok(out)
}

fn render_token(token: &str, ctx: &TemplateContext) -> Result<String> {
    if token == "orig" {
        return Ok(ctx.orig.to_string());
    }
    if token == "date" {
        return Ok(ctx.date.to_string());
    }
    if let Some(rest) = token.strip_prefix("seq:") {
        let width: usize = rest
            .parse()
            .map_err(|_| EngineError::Internal(format!("invalid `seq` width in `{{{token}}}`")))?;
        return Ok(format!("{:0width$}", ctx.seq, width = width));
    }
    Err(EngineError::Internal(format!(
        "unknown filename template token `{{{token}}}`"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_sequences_two_originals() {
        let ctx1 = TemplateContext {
            orig: "IMG_7",
            seq: 1,
            date: "2024-01-01",
        };
        let ctx2 = TemplateContext {
            orig: "IMG_8",
            seq: 2,
            date: "2024-01-01",
        };
        assert_eq!(render(DEFAULT_TEMPLATE, &ctx1).unwrap(), "IMG_7_0001");
        assert_eq!(render(DEFAULT_TEMPLATE, &ctx2).unwrap(), "IMG_8_0002");
    }

    #[test]
    fn date_token_renders_verbatim() {
        let ctx = TemplateContext {
            orig: "a",
            seq: 1,
            date: "2024-06-05",
        };
        assert_eq!(
            render("{date}_{orig}", &ctx).unwrap(),
            "2024-06-05_a"
        );
    }

    #[test]
    fn unknown_token_is_an_error() {
        let ctx = TemplateContext {
            orig: "a",
            seq: 1,
            date: "2024-06-05",
        };
        assert!(render("{orig}_{rating}", &ctx).is_err());
    }

    #[test]
    fn unterminated_token_is_an_error() {
        let ctx = TemplateContext {
            orig: "a",
            seq: 1,
            date: "2024-06-05",
        };
        assert!(render("{orig", &ctx).is_err());
    }
}
