//! Keyword Normalisation
//!
//! A post-tokenisation pass that converts WORD tokens into reserved-word
//! tokens, but only at command position. The word `in` is special-cased: it
//! only normalises inside `for`, `case` and `select` constructs. The pass
//! also validates context-sensitive separators (`;;` and friends are only
//! legal inside `case`).

use crate::ast::types::QuoteType;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::LexerError;
use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref RESERVED_WORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("if", TokenKind::If);
        m.insert("then", TokenKind::Then);
        m.insert("elif", TokenKind::Elif);
        m.insert("else", TokenKind::Else);
        m.insert("fi", TokenKind::Fi);
        m.insert("for", TokenKind::For);
        m.insert("while", TokenKind::While);
        m.insert("until", TokenKind::Until);
        m.insert("do", TokenKind::Do);
        m.insert("done", TokenKind::Done);
        m.insert("case", TokenKind::Case);
        m.insert("esac", TokenKind::Esac);
        m.insert("function", TokenKind::Function);
        m.insert("select", TokenKind::Select);
        m.insert("{", TokenKind::LBrace);
        m.insert("}", TokenKind::RBrace);
        m
    };
}

/// What the normaliser is waiting for while walking the token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expecting {
    Nothing,
    /// `for`/`select` seen: the next word is the loop variable
    LoopVariable,
    /// Loop variable (or case subject) seen: `in` may follow
    InKeyword,
    /// `case` seen: the next word is the subject
    CaseSubject,
}

/// Convert reserved words in place and validate case separators.
pub fn normalize_keywords(mut tokens: Vec<Token>) -> Result<Vec<Token>, LexerError> {
    let mut command_position = true;
    let mut expecting = Expecting::Nothing;
    let mut case_depth: u32 = 0;
    // Inside a case, between `in`/`;;` and the pattern's `)`, words stay
    // words (patterns may spell reserved words) except `esac`.
    let mut expecting_pattern = false;

    for token in tokens.iter_mut() {
        let unquoted_word = token.kind == TokenKind::Word && token.quote_type == QuoteType::None;

        match expecting {
            Expecting::LoopVariable => {
                expecting = Expecting::Nothing;
                if unquoted_word {
                    expecting = Expecting::InKeyword;
                    command_position = false;
                    continue;
                }
                // Not a name (c-style `for ((`): normal handling resumes
            }
            Expecting::CaseSubject => {
                expecting = Expecting::Nothing;
                if token.kind.is_word_like() {
                    expecting = Expecting::InKeyword;
                    command_position = false;
                    continue;
                }
            }
            Expecting::InKeyword => {
                expecting = Expecting::Nothing;
                if unquoted_word && token.text == "in" {
                    token.kind = TokenKind::In;
                    if case_depth > 0 {
                        expecting_pattern = true;
                    }
                    command_position = false;
                    continue;
                }
                // Fall through: `for i; do` and `for ((...))` have no `in`
            }
            Expecting::Nothing => {}
        }

        if expecting_pattern {
            if unquoted_word && token.text == "esac" {
                token.kind = TokenKind::Esac;
                case_depth -= 1;
                expecting_pattern = false;
                command_position = false;
            } else if token.kind == TokenKind::RParen {
                expecting_pattern = false;
                command_position = true;
            }
            continue;
        }

        match token.kind {
            TokenKind::DSemi | TokenKind::SemiAnd | TokenKind::DSemiAnd => {
                if case_depth == 0 {
                    return Err(LexerError::invalid(
                        &format!("`{}` is only valid inside case", token.text),
                        token.line,
                    ));
                }
                expecting_pattern = true;
                command_position = true;
                continue;
            }
            _ => {}
        }

        if unquoted_word && command_position {
            if let Some(&kind) = RESERVED_WORDS.get(token.text.as_str()) {
                token.kind = kind;
                match kind {
                    TokenKind::For | TokenKind::Select => expecting = Expecting::LoopVariable,
                    TokenKind::Case => {
                        expecting = Expecting::CaseSubject;
                        case_depth += 1;
                    }
                    TokenKind::Esac => {
                        // `esac` without a pattern context still closes a case
                        case_depth = case_depth.saturating_sub(1);
                    }
                    _ => {}
                }
            }
        }

        // `)` counts as command position so case bodies start correctly;
        // after a subshell the next token is an operator or EOF anyway
        command_position =
            token.kind.starts_command() || matches!(token.kind, TokenKind::RParen);
    }

    if case_depth > 0 {
        let last_line = tokens.last().map(|t| t.line).unwrap_or(0);
        return Err(LexerError::unclosed("case", last_line));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let out = Lexer::new(src).tokenize().unwrap();
        out.tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_at_command_position() {
        let k = kinds("if true; then echo hi; fi");
        assert_eq!(k[0], TokenKind::If);
        assert_eq!(k[2], TokenKind::Then);
        assert!(k.contains(&TokenKind::Fi));
    }

    #[test]
    fn keywords_as_arguments_stay_words() {
        let k = kinds("echo if then fi");
        assert_eq!(k[0], TokenKind::Word);
        assert_eq!(k[1], TokenKind::Word);
        assert_eq!(k[2], TokenKind::Word);
        assert_eq!(k[3], TokenKind::Word);
    }

    #[test]
    fn in_only_normalises_in_loops() {
        let k = kinds("for x in a b; do echo $x; done");
        assert_eq!(k[0], TokenKind::For);
        assert_eq!(k[1], TokenKind::Word);
        assert_eq!(k[2], TokenKind::In);

        let k2 = kinds("echo in");
        assert_eq!(k2[1], TokenKind::Word);
    }

    #[test]
    fn case_patterns_can_spell_keywords() {
        let k = kinds("case $x in if) echo a;; esac");
        assert_eq!(k[0], TokenKind::Case);
        assert_eq!(k[2], TokenKind::In);
        // the pattern `if` stays a word
        assert_eq!(k[3], TokenKind::Word);
        assert!(k.contains(&TokenKind::Esac));
    }

    #[test]
    fn double_semi_outside_case_is_an_error() {
        assert!(Lexer::new("echo a ;; echo b").tokenize().is_err());
    }

    #[test]
    fn quoted_keywords_stay_words() {
        let k = kinds("'if' true");
        assert_eq!(k[0], TokenKind::String);
    }

    #[test]
    fn brace_group_tokens() {
        let k = kinds("{ echo a; }");
        assert_eq!(k[0], TokenKind::LBrace);
        assert!(k.contains(&TokenKind::RBrace));
    }
}
