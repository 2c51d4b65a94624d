//! Lexer tests: keywords, operators, literals, template literals, markup
//! mode switching, line-break tracking, error recovery and determinism.

use kiln_lexer::{Lexer, Token, TokenKind};
use kiln_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn tokens(source: &str) -> Vec<Token> {
    let sf = SourceFile::new("test.tsx", source);
    Lexer::new(&sf).lex().tokens
}

/// Token kinds without the trailing Eof.
fn kinds(source: &str) -> Vec<TokenKind> {
    tokens(source)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind)
        .collect()
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    let sf = SourceFile::new("test.tsx", source);
    Lexer::new(&sf)
        .lex()
        .errors
        .errors
        .into_iter()
        .map(|e| e.code)
        .collect()
}

fn ident(name: &str) -> TokenKind {
    TokenKind::Ident(name.to_string())
}

fn string(value: &str) -> TokenKind {
    TokenKind::String(value.to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Keywords & identifiers
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_declaration_keywords() {
    assert_eq!(
        kinds("const let var function return"),
        vec![
            TokenKind::Const,
            TokenKind::Let,
            TokenKind::Var,
            TokenKind::Function,
            TokenKind::Return
        ]
    );
}

#[test]
fn test_contextual_words_are_identifiers() {
    assert_eq!(
        kinds("of as from type interface"),
        vec![ident("of"), ident("as"), ident("from"), ident("type"), ident("interface")]
    );
}

#[test]
fn test_identifier_characters() {
    assert_eq!(kinds("$el _x café a1"), vec![ident("$el"), ident("_x"), ident("café"), ident("a1")]);
}

// ─────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_equality_operators() {
    assert_eq!(
        kinds("a === b !== c == d != e"),
        vec![
            ident("a"),
            TokenKind::EqEqEq,
            ident("b"),
            TokenKind::BangEqEq,
            ident("c"),
            TokenKind::EqEq,
            ident("d"),
            TokenKind::BangEq,
            ident("e"),
        ]
    );
}

#[test]
fn test_logical_and_nullish_operators() {
    assert_eq!(
        kinds("a && b || c ?? d ??= e"),
        vec![
            ident("a"),
            TokenKind::AmpAmp,
            ident("b"),
            TokenKind::PipePipe,
            ident("c"),
            TokenKind::QuestionQuestion,
            ident("d"),
            TokenKind::QuestionQuestionEq,
            ident("e"),
        ]
    );
}

#[test]
fn test_optional_chaining_vs_conditional_number() {
    assert_eq!(
        kinds("a?.b"),
        vec![ident("a"), TokenKind::QuestionDot, ident("b")]
    );
    assert_eq!(
        kinds("a?.5:1"),
        vec![
            ident("a"),
            TokenKind::Question,
            TokenKind::Number(0.5),
            TokenKind::Colon,
            TokenKind::Number(1.0)
        ]
    );
}

#[test]
fn test_arrow_and_spread() {
    assert_eq!(
        kinds("(...xs) => xs"),
        vec![
            TokenKind::LParen,
            TokenKind::DotDotDot,
            ident("xs"),
            TokenKind::RParen,
            TokenKind::Arrow,
            ident("xs"),
        ]
    );
}

#[test]
fn test_nested_type_arguments_close_separately() {
    assert_eq!(
        kinds("Array<Array<string>>"),
        vec![
            ident("Array"),
            TokenKind::Less,
            ident("Array"),
            TokenKind::Less,
            ident("string"),
            TokenKind::Greater,
            TokenKind::Greater,
        ]
    );
}

#[test]
fn test_bitwise_and_compound_operators() {
    assert_eq!(
        kinds("a & b | c ^ ~d << 2"),
        vec![
            ident("a"),
            TokenKind::Amp,
            ident("b"),
            TokenKind::Pipe,
            ident("c"),
            TokenKind::Caret,
            TokenKind::Tilde,
            ident("d"),
            TokenKind::LessLess,
            TokenKind::Number(2.0),
        ]
    );
    assert_eq!(
        kinds("a **= 2; a &= 1; a |= 1; a ^= 1; a <<= 1"),
        vec![
            ident("a"),
            TokenKind::StarStarEq,
            TokenKind::Number(2.0),
            TokenKind::Semicolon,
            ident("a"),
            TokenKind::AmpEq,
            TokenKind::Number(1.0),
            TokenKind::Semicolon,
            ident("a"),
            TokenKind::PipeEq,
            TokenKind::Number(1.0),
            TokenKind::Semicolon,
            ident("a"),
            TokenKind::CaretEq,
            TokenKind::Number(1.0),
            TokenKind::Semicolon,
            ident("a"),
            TokenKind::LessLessEq,
            TokenKind::Number(1.0),
        ]
    );
}

#[test]
fn test_right_shift_stays_split() {
    assert_eq!(
        kinds("a >>> 1"),
        vec![
            ident("a"),
            TokenKind::Greater,
            TokenKind::Greater,
            TokenKind::Greater,
            TokenKind::Number(1.0),
        ]
    );
}

#[test]
fn test_generic_arrow_params_are_not_markup() {
    assert_eq!(
        kinds("<T,>(x: T) => x"),
        vec![
            TokenKind::Less,
            ident("T"),
            TokenKind::Comma,
            TokenKind::Greater,
            TokenKind::LParen,
            ident("x"),
            TokenKind::Colon,
            ident("T"),
            TokenKind::RParen,
            TokenKind::Arrow,
            ident("x"),
        ]
    );
    assert_eq!(kinds("<T extends object>(x: T) => x")[0], TokenKind::Less);
    assert_eq!(kinds("<T>x</T>")[0], TokenKind::MarkupOpen);
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_number_forms() {
    assert_eq!(
        kinds("42 3.14 .5 1e3 2.5e-2 0xff 0b101 0o17 1_000"),
        vec![
            TokenKind::Number(42.0),
            TokenKind::Number(3.14),
            TokenKind::Number(0.5),
            TokenKind::Number(1000.0),
            TokenKind::Number(0.025),
            TokenKind::Number(255.0),
            TokenKind::Number(5.0),
            TokenKind::Number(15.0),
            TokenKind::Number(1000.0),
        ]
    );
}

#[test]
fn test_member_access_on_integer_is_not_a_fraction() {
    assert_eq!(
        kinds("1.toString"),
        vec![TokenKind::Number(1.0), TokenKind::Dot, ident("toString")]
    );
}

#[test]
fn test_string_quotes_and_escapes() {
    assert_eq!(
        kinds(r#"'it\'s' "a\nb" "A\u{1F600}\x41""#),
        vec![string("it's"), string("a\nb"), string("A\u{1F600}A")]
    );
}

#[test]
fn test_unknown_escape_keeps_character() {
    assert_eq!(kinds(r#""\d""#), vec![string("d")]);
}

#[test]
fn test_unterminated_string() {
    assert_eq!(error_codes("'abc\nx"), vec![ErrorCode::UNTERMINATED_STRING]);
}

// ─────────────────────────────────────────────────────────────────────
// Template literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_regex_literal_in_operand_position() {
    assert_eq!(
        kinds(r"x = /a[/]b\/c/gi.test(y)"),
        vec![
            ident("x"),
            TokenKind::Eq,
            TokenKind::Regex {
                pattern: r"a[/]b\/c".into(),
                flags: "gi".into()
            },
            TokenKind::Dot,
            ident("test"),
            TokenKind::LParen,
            ident("y"),
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_slash_after_operand_is_division() {
    assert_eq!(
        kinds("a / b / c"),
        vec![
            ident("a"),
            TokenKind::Slash,
            ident("b"),
            TokenKind::Slash,
            ident("c"),
        ]
    );
}

#[test]
fn test_unterminated_regex() {
    assert_eq!(
        error_codes("x = /abc\n"),
        vec![ErrorCode::UNTERMINATED_STRING]
    );
}

#[test]
fn test_template_without_substitution_is_string() {
    assert_eq!(kinds("`hello\nworld`"), vec![string("hello\nworld")]);
}

#[test]
fn test_template_interpolation() {
    assert_eq!(
        kinds("`a ${x} b ${y} c`"),
        vec![
            TokenKind::TemplateStart("a ".into()),
            TokenKind::InterpolationStart,
            ident("x"),
            TokenKind::InterpolationEnd,
            TokenKind::TemplatePart(" b ".into()),
            TokenKind::InterpolationStart,
            ident("y"),
            TokenKind::InterpolationEnd,
            TokenKind::TemplateEnd(" c".into()),
        ]
    );
}

#[test]
fn test_template_with_object_in_interpolation() {
    let k = kinds("`${ {a: 1}.a }`");
    assert_eq!(k.first(), Some(&TokenKind::TemplateStart(String::new())));
    assert_eq!(k.last(), Some(&TokenKind::TemplateEnd(String::new())));
    assert!(k.contains(&TokenKind::LBrace));
    assert!(k.contains(&TokenKind::RBrace));
}

#[test]
fn test_unterminated_template() {
    assert!(error_codes("`abc ${x}").contains(&ErrorCode::UNTERMINATED_STRING));
}

// ─────────────────────────────────────────────────────────────────────
// Comments & line breaks
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("a // line\n/* block\n */ b"),
        vec![ident("a"), ident("b")]
    );
}

#[test]
fn test_newline_before_is_recorded() {
    let toks = tokens("a\nb c /* x\n */ d");
    let flags: Vec<bool> = toks.iter().map(|t| t.newline_before).collect();
    assert_eq!(flags, vec![false, true, false, true, false]);
}

#[test]
fn test_unterminated_block_comment() {
    assert_eq!(error_codes("a /* b"), vec![ErrorCode::UNCLOSED_DELIMITER]);
}

// ─────────────────────────────────────────────────────────────────────
// Markup
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_element_with_text_child() {
    assert_eq!(
        kinds("return <div>Hi</div>"),
        vec![
            TokenKind::Return,
            TokenKind::MarkupOpen,
            ident("div"),
            TokenKind::MarkupTagEnd,
            TokenKind::MarkupText("Hi".into()),
            TokenKind::MarkupCloseOpen,
            ident("div"),
            TokenKind::MarkupTagEnd,
        ]
    );
}

#[test]
fn test_less_than_after_operand_is_comparison() {
    assert_eq!(
        kinds("a <b"),
        vec![ident("a"), TokenKind::Less, ident("b")]
    );
}

#[test]
fn test_attributes_and_self_closing() {
    assert_eq!(
        kinds(r#"(<Button aria-label="x" onClick={go} disabled />)"#),
        vec![
            TokenKind::LParen,
            TokenKind::MarkupOpen,
            ident("Button"),
            ident("aria-label"),
            TokenKind::Eq,
            TokenKind::MarkupAttrString("x".into()),
            ident("onClick"),
            TokenKind::Eq,
            TokenKind::LBrace,
            ident("go"),
            TokenKind::RBrace,
            ident("disabled"),
            TokenKind::MarkupSelfClose,
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_attribute_names_are_not_keywords() {
    let k = kinds("<label class='a' for='b' />");
    assert!(k.contains(&ident("class")));
    assert!(k.contains(&ident("for")));
}

#[test]
fn test_fragment() {
    assert_eq!(
        kinds("<><a /></>"),
        vec![
            TokenKind::MarkupOpen,
            TokenKind::MarkupTagEnd,
            TokenKind::MarkupOpen,
            ident("a"),
            TokenKind::MarkupSelfClose,
            TokenKind::MarkupCloseOpen,
            TokenKind::MarkupTagEnd,
        ]
    );
}

#[test]
fn test_expression_container_with_nested_markup() {
    let k = kinds("<ul>{items.map(i => <li>{i}</li>)}</ul>");
    let opens = k.iter().filter(|t| **t == TokenKind::MarkupOpen).count();
    let closes = k.iter().filter(|t| **t == TokenKind::MarkupCloseOpen).count();
    assert_eq!(opens, 2);
    assert_eq!(closes, 2);
    assert!(k.contains(&TokenKind::Arrow));
    assert_eq!(k.last(), Some(&TokenKind::MarkupTagEnd));
}

#[test]
fn test_nested_braces_inside_container() {
    let k = kinds("<p style={{ color: 'red' }}>x</p>");
    assert!(k.contains(&ident("color")));
    assert!(k.contains(&TokenKind::MarkupText("x".into())));
}

#[test]
fn test_markup_text_keeps_quotes_and_whitespace() {
    let k = kinds("<p>\n  Don't stop\n</p>");
    assert!(k.contains(&TokenKind::MarkupText("\n  Don't stop\n".into())));
}

#[test]
fn test_dotted_component_name() {
    assert_eq!(
        kinds("<Ctx.Provider />"),
        vec![
            TokenKind::MarkupOpen,
            ident("Ctx"),
            TokenKind::Dot,
            ident("Provider"),
            TokenKind::MarkupSelfClose,
        ]
    );
}

#[test]
fn test_unterminated_element() {
    assert_eq!(
        error_codes("const x = <div>hello"),
        vec![ErrorCode::UNTERMINATED_MARKUP]
    );
}

#[test]
fn test_generic_call_is_not_markup() {
    assert_eq!(
        kinds("useState<string>('')"),
        vec![
            ident("useState"),
            TokenKind::Less,
            ident("string"),
            TokenKind::Greater,
            TokenKind::LParen,
            string(""),
            TokenKind::RParen,
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────
// Errors & spans
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unexpected_character_recovers() {
    assert_eq!(kinds("a # b"), vec![ident("a"), ident("b")]);
    assert_eq!(error_codes("a # b"), vec![ErrorCode::UNEXPECTED_TOKEN]);
}

#[test]
fn test_error_cap() {
    let source = "#".repeat(50);
    let sf = SourceFile::new("test.tsx", source);
    let result = Lexer::new(&sf).lex();
    assert_eq!(result.errors.errors.len(), kiln_types::MAX_ERRORS);
    assert_eq!(result.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
}

#[test]
fn test_spans_count_characters() {
    let toks = tokens("é = 'ü'");
    assert_eq!(toks[2].span.start_col, 5);
    assert_eq!(toks[2].span.end_col, 7);
}

#[test]
fn test_deterministic_100_iterations() {
    let source = "export default function App() {\n  return <div className={`a ${b}`}>{x ?? 1}</div>\n}";
    let first = tokens(source);
    for _ in 0..100 {
        assert_eq!(tokens(source), first);
    }
}
