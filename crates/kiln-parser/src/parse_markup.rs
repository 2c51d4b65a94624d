//! Element markup parsing.
//!
//! ```text
//! Element   = "<" Name { Attr } ( "/>" | ">" { Child } "</" Name ">" )
//! Fragment  = "<" ">" { Child } "</" ">"
//! Attr      = Name [ "=" ( String | "{" Expr "}" ) ] | "{" "..." Expr "}"
//! Child     = Text | "{" [ Expr ] "}" | Element
//! ```

use kiln_lexer::TokenKind;
use kiln_types::ast::*;
use kiln_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_markup_element(&mut self) -> Option<MarkupElement> {
        if !self.enter_nesting() {
            return None;
        }
        let element = self.parse_markup_element_inner();
        self.leave_nesting();
        element
    }

    fn parse_markup_element_inner(&mut self) -> Option<MarkupElement> {
        let start = self.expect(&TokenKind::MarkupOpen)?.span;

        if self.eat(&TokenKind::MarkupTagEnd) {
            let children = self.parse_markup_children()?;
            self.expect(&TokenKind::MarkupCloseOpen)?;
            if !self.check(&TokenKind::MarkupTagEnd) {
                let span = self.current_span();
                self.error_at(
                    ErrorCode::MISMATCHED_CLOSING_TAG,
                    "expected '</>' to close fragment",
                    span,
                );
                return None;
            }
            let end = self.advance().span;
            return Some(MarkupElement {
                name: MarkupName::Fragment,
                attributes: Vec::new(),
                children,
                span: start.merge(end),
            });
        }

        let (name, name_text) = self.parse_markup_name()?;
        let mut attributes = Vec::new();

        loop {
            match self.peek_kind().clone() {
                TokenKind::MarkupSelfClose => {
                    let end = self.advance().span;
                    return Some(MarkupElement {
                        name,
                        attributes,
                        children: Vec::new(),
                        span: start.merge(end),
                    });
                }
                TokenKind::MarkupTagEnd => {
                    self.advance();
                    break;
                }
                TokenKind::LBrace => {
                    let open = self.advance().span;
                    self.expect(&TokenKind::DotDotDot)?;
                    let value = self.parse_assignment()?;
                    self.expect_closing(&TokenKind::RBrace, open)?;
                    attributes.push(MarkupAttr::Spread(value));
                }
                TokenKind::Ident(_) => attributes.push(self.parse_markup_attribute()?),
                TokenKind::Eof => return None,
                other => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected attribute or '>' in <{name_text}>, got {other}"),
                    );
                    return None;
                }
            }
        }

        let children = self.parse_markup_children()?;

        let close_start = self.expect(&TokenKind::MarkupCloseOpen)?.span;
        let closing = if self.check(&TokenKind::MarkupTagEnd) {
            String::new()
        } else {
            self.parse_markup_name()?.1
        };
        if closing != name_text {
            let span = close_start.merge(self.previous_span());
            self.error_at(
                ErrorCode::MISMATCHED_CLOSING_TAG,
                format!("expected closing tag </{name_text}>, got </{closing}>"),
                span,
            );
            return None;
        }
        let end = self.expect(&TokenKind::MarkupTagEnd)?.span;

        Some(MarkupElement {
            name,
            attributes,
            children,
            span: start.merge(end),
        })
    }

    /// `div`, `my-widget`, `Button`, `Ctx.Provider`, `svg:rect`.
    fn parse_markup_name(&mut self) -> Option<(MarkupName, String)> {
        let first = self.expect_identifier()?;
        let mut segments = vec![first.name];

        if self.eat(&TokenKind::Colon) {
            let local = self.expect_identifier()?;
            let text = format!("{}:{}", segments[0], local.name);
            return Some((MarkupName::Intrinsic(text.clone()), text));
        }
        while self.eat(&TokenKind::Dot) {
            segments.push(self.expect_identifier()?.name);
        }

        let text = segments.join(".");
        let intrinsic = segments.len() == 1
            && (segments[0].starts_with(|c: char| c.is_ascii_lowercase()) || segments[0].contains('-'));
        let name = if intrinsic {
            MarkupName::Intrinsic(text.clone())
        } else {
            MarkupName::Component(segments)
        };
        Some((name, text))
    }

    /// `name`, `name="text"`, `name={expr}`
    fn parse_markup_attribute(&mut self) -> Option<MarkupAttr> {
        let ident = self.expect_identifier()?;
        let mut name = ident.name;
        if self.eat(&TokenKind::Colon) {
            let local = self.expect_identifier()?;
            name = format!("{name}:{}", local.name);
        }

        if !self.eat(&TokenKind::Eq) {
            return Some(MarkupAttr::Named {
                name,
                value: None,
                span: ident.span,
            });
        }

        let value = match self.peek_kind().clone() {
            TokenKind::MarkupAttrString(text) => {
                self.advance();
                MarkupAttrValue::Text(text)
            }
            TokenKind::LBrace => {
                let open = self.advance().span;
                if self.check(&TokenKind::RBrace) {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("attribute '{name}' needs a value inside '{{}}'"),
                    );
                    return None;
                }
                let expr = self.parse_assignment()?;
                self.expect_closing(&TokenKind::RBrace, open)?;
                MarkupAttrValue::Expr(expr)
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected attribute value for '{name}', got {other}"),
                );
                return None;
            }
        };
        let span = ident.span.merge(self.previous_span());
        Some(MarkupAttr::Named {
            name,
            value: Some(value),
            span,
        })
    }

    /// Children up to (not including) the closing tag.
    fn parse_markup_children(&mut self) -> Option<Vec<MarkupChild>> {
        let mut children = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::MarkupCloseOpen => return Some(children),
                // The lexer has already reported the unterminated element.
                TokenKind::Eof => return None,
                TokenKind::MarkupText(text) => {
                    self.advance();
                    children.push(MarkupChild::Text(text));
                }
                TokenKind::MarkupOpen => {
                    children.push(MarkupChild::Element(self.parse_markup_element()?));
                }
                TokenKind::LBrace => {
                    let open = self.advance().span;
                    if self.eat(&TokenKind::RBrace) {
                        children.push(MarkupChild::Expr(None));
                        continue;
                    }
                    if self.check(&TokenKind::DotDotDot) {
                        self.unsupported("spread children", open.merge(self.current_span()));
                        return None;
                    }
                    let expr = self.parse_expression()?;
                    self.expect_closing(&TokenKind::RBrace, open)?;
                    children.push(MarkupChild::Expr(Some(expr)));
                }
                other => {
                    let span = self.current_span();
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("unexpected {other} in element children"),
                        span,
                    );
                    return None;
                }
            }
        }
    }
}
