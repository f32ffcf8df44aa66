//! Pairs opening tags with their closing tags. Unbalanced markup is
//! never an error: an opening tag that finds no partner simply stays
//! unassociated and is later emitted as a lone tag.

use std::collections::HashMap;

use kstring::KString;

use crate::lexer::{Token, TokenKind, RAW_TEXT_ELEMENTS};
use crate::warn;

/// Retype every token between an opening and the following closing
/// tag named `name` to text.
pub fn textify(tokens: &mut [Token], name: &str) {
    let mut inside = false;
    for token in tokens.iter_mut() {
        if token.is_tag() && !token.is_standalone && token.name.as_str() == name {
            inside = token.kind == TokenKind::TagOpen;
            continue;
        }
        if inside {
            token.textify();
        }
    }
}

/// Neutralize raw-text elements, then pair every closing tag with the
/// innermost still unmatched opening tag of the same name, in one
/// sweep.
pub fn associate(tokens: &mut [Token]) {
    for name in RAW_TEXT_ELEMENTS {
        textify(tokens, name);
    }
    let mut pending: HashMap<KString, Vec<usize>> = HashMap::new();
    for i in 0..tokens.len() {
        match tokens[i].kind {
            TokenKind::TagOpen if !tokens[i].is_standalone => {
                pending.entry(tokens[i].name.clone()).or_default().push(i);
            }
            TokenKind::TagClose => {
                let opens = pending.get_mut(&tokens[i].name);
                if let Some(b) = opens.and_then(|opens| opens.pop()) {
                    tokens[b].association = Some(i);
                    tokens[i].association = Some(b);
                }
            }
            _ => ()
        }
    }
    for token in tokens.iter() {
        if token.is_tag() && !token.is_standalone && token.association.is_none() {
            warn!("unmatched {} tag {:?} at byte {}",
                  if token.kind == TokenKind::TagOpen { "opening" } else { "closing" },
                  token.name.as_str(), token.start);
        }
    }
}

/// Nesting depth of every token, derived from the associations;
/// closing tags have the depth of their opening tag.
pub fn depths(tokens: &[Token]) -> Vec<usize> {
    let mut depth = 0;
    let mut result = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        match token.association {
            Some(a) if a < i => {
                depth -= 1;
                result.push(depth);
            }
            Some(_) => {
                result.push(depth);
                depth += 1;
            }
            None => result.push(depth)
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn pairs(s: &str) -> Vec<(String, String)> {
        let mut tokens = lex(s);
        associate(&mut tokens);
        tokens.iter().enumerate()
            .filter_map(|(i, t)| match t.association {
                Some(e) if e > i => Some((t.text(s).to_string(),
                                          tokens[e].text(s).to_string())),
                _ => None
            })
            .collect()
    }

    #[test]
    fn t_nested_same_name() {
        let s = "<div id=1><div id=2></div></div>";
        assert_eq!(pairs(s), [
            ("<div id=1>".to_string(), "</div>".to_string()),
            ("<div id=2>".to_string(), "</div>".to_string()),
        ]);
        let mut tokens = lex(s);
        associate(&mut tokens);
        assert_eq!(tokens[0].association, Some(3));
        assert_eq!(tokens[1].association, Some(2));
    }

    #[test]
    fn t_unmatched_open_stays_unassociated() {
        let mut tokens = lex("<div><p>text</div>");
        associate(&mut tokens);
        assert_eq!(tokens[0].association, Some(3));
        assert_eq!(tokens[1].association, None);
    }

    #[test]
    fn t_case_insensitive() {
        let mut tokens = lex("<UL><li>a</LI></ul>");
        associate(&mut tokens);
        assert_eq!(tokens[0].association, Some(4));
        assert_eq!(tokens[1].association, Some(3));
    }

    #[test]
    fn t_script_content_is_opaque() {
        let s = "<script>if (a<b) { x = '<div>'; }</script><div></div>";
        let mut tokens = lex(s);
        associate(&mut tokens);
        let open = tokens.iter().filter(|t| t.kind == TokenKind::TagOpen).count();
        assert_eq!(open, 2);
        assert_eq!(tokens[0].association, Some(tokens.len() - 3));
        assert!(tokens[1..tokens.len() - 3].iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn t_textify() {
        let mut tokens = lex("<x><b>y</b></x><b></b>");
        textify(&mut tokens, "x");
        use TokenKind::*;
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [TagOpen, Text, Text, Text, TagClose, TagOpen, TagClose]);
        assert_eq!(tokens[1].name.as_str(), "");
        assert!(tokens[1].attributes.is_empty());
    }

    #[test]
    fn t_standalone_not_associated() {
        let mut tokens = lex("<p><br/><img src=x></p>");
        associate(&mut tokens);
        assert_eq!(tokens[0].association, Some(3));
        assert_eq!(tokens[1].association, None);
        assert_eq!(tokens[2].association, None);
    }

    #[test]
    fn t_crossing_and_stray_tags() {
        let mut tokens = lex("<b><b></b><i></b></i></i>");
        associate(&mut tokens);
        let assoc: Vec<_> = tokens.iter().map(|t| t.association).collect();
        assert_eq!(assoc, [Some(4), Some(2), Some(1), Some(5), Some(0), Some(3), None]);
    }

    #[test]
    fn t_deep_nesting() {
        let n = 100_000;
        let mut tokens = lex(&format!("{}{}", "<b>".repeat(n), "</b>".repeat(n)));
        associate(&mut tokens);
        assert_eq!(tokens[0].association, Some(2 * n - 1));
        assert_eq!(tokens[n - 1].association, Some(n));
        assert_eq!(depths(&tokens)[n - 1], n - 1);
    }

    #[test]
    fn t_depths() {
        let mut tokens = lex("<a><b>x</b></a>y");
        associate(&mut tokens);
        assert_eq!(depths(&tokens), [0, 1, 2, 1, 0, 0]);
    }
}
