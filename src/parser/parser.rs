//! Main Parser
//!
//! Hand-written recursive descent over the token list. The entry points here
//! drive statement parsing and delegate to the specialised sub-parsers for
//! commands, control structures, tests, functions, redirections and arrays.
//! The parser always consumes the whole token stream or reports an error.

use crate::ast::types::{Command, Program, Statement};
use crate::lexer::token::TokenKind;
use crate::lexer::{LexOutput, Lexer, LexerError};
use crate::parser::function_parser::{at_function_def, parse_function_def};
use crate::parser::statement_parser::parse_and_or;
use crate::parser::types::{ErrorMode, ParseError, ParserContext};

/// Parser front-end. Configure the error mode, then parse.
#[derive(Debug, Default)]
pub struct Parser {
    mode: ErrorMode,
    interactive: bool,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn with_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Tokenise and parse a source string.
    pub fn parse(&self, source: &str) -> Result<Program, ParseError> {
        let output = Lexer::new(source)
            .interactive(self.interactive)
            .tokenize()
            .map_err(lex_to_parse_error)?;
        self.parse_lexed(output)
    }

    /// Parse an already-tokenised input.
    pub fn parse_lexed(&self, output: LexOutput) -> Result<Program, ParseError> {
        let mut ctx =
            ParserContext::new(output.tokens, output.heredocs, output.source).with_mode(self.mode);
        parse_program(&mut ctx)
    }

    /// Parse and also hand back the collected (non-fatal) errors.
    pub fn parse_collecting(&self, source: &str) -> (Option<Program>, Vec<ParseError>) {
        let output = match Lexer::new(source).tokenize() {
            Ok(out) => out,
            Err(err) => return (None, vec![lex_to_parse_error(err)]),
        };
        let mut ctx = ParserContext::new(output.tokens, output.heredocs, output.source)
            .with_mode(self.mode);
        match parse_program(&mut ctx) {
            Ok(program) => (Some(program), ctx.errors),
            Err(err) => {
                let mut errors = ctx.errors;
                errors.push(err);
                (None, errors)
            }
        }
    }
}

pub fn lex_to_parse_error(err: LexerError) -> ParseError {
    ParseError::new(err.to_string())
}

/// Parse a full program: statements separated by `;`, `&` and newlines.
pub fn parse_program(ctx: &mut ParserContext) -> Result<Program, ParseError> {
    let mut statements = Vec::new();

    loop {
        ctx.skip_separators();
        if ctx.at_end() {
            break;
        }
        match parse_statement(ctx) {
            Ok(statement) => {
                statements.push(statement);
                if !ctx.at_end()
                    && !matches!(
                        ctx.peek_kind(),
                        TokenKind::Semi | TokenKind::Newline | TokenKind::Amp
                    )
                {
                    let err = ctx.error_at_current(&format!(
                        "unexpected token `{}`",
                        ctx.peek().text
                    ));
                    if ctx.mode == ErrorMode::Recover {
                        ctx.report(err)?;
                        ctx.skip_to_statement_boundary();
                    } else {
                        return Err(err);
                    }
                }
            }
            Err(err) => {
                if ctx.mode == ErrorMode::Recover {
                    ctx.report(err)?;
                    ctx.skip_to_statement_boundary();
                } else {
                    return Err(err);
                }
            }
        }
    }

    Ok(Program { statements })
}

/// One statement: a function definition, a control structure, or an and-or
/// list, with an optional `&` background marker.
pub fn parse_statement(ctx: &mut ParserContext) -> Result<Statement, ParseError> {
    if at_function_def(ctx) {
        return Ok(Statement::FunctionDef(parse_function_def(ctx)?));
    }

    let mut list = parse_and_or(ctx)?;
    if ctx.eat(TokenKind::Amp) {
        list.background = true;
    }

    // A lone, un-negated control command stands as its own statement kind
    let is_plain_control = list.operators.is_empty()
        && list.pipelines.len() == 1
        && !list.pipelines[0].negated
        && list.pipelines[0].commands.len() == 1
        && matches!(list.pipelines[0].commands[0], Command::Control(_));

    if is_plain_control {
        let background = list.background;
        let Some(Command::Control(mut ctrl)) = list.pipelines.remove(0).commands.pop() else {
            unreachable!()
        };
        ctrl.background = background;
        return Ok(Statement::Control(ctrl));
    }

    Ok(Statement::AndOr(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{AndOrOperator, ControlKind, RedirectKind};

    fn parse(src: &str) -> Program {
        Parser::new().parse(src).unwrap()
    }

    #[test]
    fn empty_program() {
        assert!(parse("").statements.is_empty());
        assert!(parse("\n\n;\n").statements.is_empty());
    }

    #[test]
    fn statements_split_on_separators() {
        let p = parse("echo a; echo b\necho c");
        assert_eq!(p.statements.len(), 3);
    }

    #[test]
    fn background_statement() {
        let p = parse("sleep 5 &");
        match &p.statements[0] {
            Statement::AndOr(list) => assert!(list.background),
            other => panic!("expected and-or, got {other:?}"),
        }
    }

    #[test]
    fn control_statement_unwraps() {
        let p = parse("if true; then echo hi; fi");
        assert!(matches!(p.statements[0], Statement::Control(_)));
    }

    #[test]
    fn function_definition_statement() {
        let p = parse("f() { echo hi; }\nf");
        assert!(matches!(p.statements[0], Statement::FunctionDef(_)));
        assert!(matches!(p.statements[1], Statement::AndOr(_)));
    }

    #[test]
    fn and_or_with_background() {
        let p = parse("true && echo yes || echo no");
        match &p.statements[0] {
            Statement::AndOr(list) => {
                assert_eq!(list.operators, vec![AndOrOperator::And, AndOrOperator::Or]);
            }
            other => panic!("expected and-or, got {other:?}"),
        }
    }

    #[test]
    fn heredoc_attaches_to_redirect() {
        let p = parse("cat <<EOF\nhello\nEOF\n");
        match &p.statements[0] {
            Statement::AndOr(list) => {
                let Command::Simple(cmd) = &list.pipelines[0].commands[0] else {
                    panic!("expected simple command");
                };
                assert_eq!(cmd.redirects.len(), 1);
                assert!(matches!(
                    cmd.redirects[0].kind,
                    RedirectKind::HereDoc { strip_tabs: false }
                ));
                assert_eq!(cmd.redirects[0].heredoc_content.as_deref(), Some("hello\n"));
            }
            other => panic!("expected and-or, got {other:?}"),
        }
    }

    #[test]
    fn nested_control_structures() {
        let src = "for i in 1 2; do\n  if [ $i = 1 ]; then echo one; else echo two; fi\ndone";
        let p = parse(src);
        match &p.statements[0] {
            Statement::Control(ctrl) => {
                let ControlKind::For(f) = &ctrl.kind else {
                    panic!("expected for loop");
                };
                assert_eq!(f.variable, "i");
                assert_eq!(f.body.len(), 1);
            }
            other => panic!("expected control, got {other:?}"),
        }
    }

    #[test]
    fn case_with_terminators() {
        use crate::ast::types::CaseTerminator;
        let p = parse("case $x in a) echo a;; b) echo b;& c) echo c;;& *) echo d;; esac");
        match &p.statements[0] {
            Statement::Control(ctrl) => {
                let ControlKind::Case(c) = &ctrl.kind else {
                    panic!("expected case");
                };
                assert_eq!(c.items.len(), 4);
                assert_eq!(c.items[0].terminator, CaseTerminator::Break);
                assert_eq!(c.items[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(c.items[2].terminator, CaseTerminator::ContinueMatching);
            }
            other => panic!("expected control, got {other:?}"),
        }
    }

    #[test]
    fn parse_determinism() {
        let src = "if [ -f x ]; then cat x | wc -l; fi; echo ${v:-d} & wait";
        assert_eq!(parse(src), parse(src));
    }

    #[test]
    fn full_stream_consumed_or_error() {
        assert!(Parser::new().parse("echo hi )").is_err());
    }

    #[test]
    fn missing_fi_reports_hint() {
        let err = Parser::new().parse("if true; then echo hi").unwrap_err();
        assert!(err.to_string().contains("fi"));
    }

    #[test]
    fn recover_mode_collects_errors() {
        let parser = Parser::new().with_mode(ErrorMode::Recover);
        let (program, errors) = parser.parse_collecting("echo ok\n)\necho also-ok");
        assert!(!errors.is_empty());
        let program = program.unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn cstyle_for() {
        let p = parse("for ((i=0; i<3; i++)); do echo $i; done");
        match &p.statements[0] {
            Statement::Control(ctrl) => {
                let ControlKind::CStyleFor(f) = &ctrl.kind else {
                    panic!("expected c-style for");
                };
                assert_eq!(f.init.as_deref(), Some("i=0"));
                assert_eq!(f.condition.as_deref(), Some("i<3"));
                assert_eq!(f.update.as_deref(), Some("i++"));
            }
            other => panic!("expected control, got {other:?}"),
        }
    }

    #[test]
    fn for_without_in_iterates_positionals() {
        let p = parse("for x; do echo $x; done");
        match &p.statements[0] {
            Statement::Control(ctrl) => {
                let ControlKind::For(f) = &ctrl.kind else { panic!() };
                assert!(f.words.is_none());
            }
            other => panic!("expected control, got {other:?}"),
        }
    }
}
