//! Recursive-descent parser
//!
//! One token of lookahead. Precedence, loosest first: `=`/`:=`, `||`, `&&`,
//! comparisons, `+`/`-`, `*`/`/`/`%`, prefix `-`/`!`/`@`, then postfix
//! selection, application and indexing. A `(` or `[` that starts a new line
//! is never postfix, so a statement may begin with a grouped expression or a
//! tuple literal.

use super::ast::{
    ActorItem, BinOp, CaseClause, Literal, Node, NodeId, NodeKind, Pat, PatKind, TypeAnno,
    UnaryOp, VarDecl,
};
use super::error::{ParseError, ParseResult, ParserError, ParserErrorKind};
use super::lexer::{Lexer, Token, TokenKind, unescape};
use crate::util::span::{SourceText, Span};

/// Parse a complete program
pub fn parse(source: &str) -> ParseResult<Node> {
    Parser::new(SourceText::new(source))?.parse_program()
}

/// Parser state over one source text
pub struct Parser {
    lexer: Lexer,
    current: Token,
    previous: Span,
    next_id: u32,
}

const SEQ_TERMINATORS: &[&str] = &[
    "end", "else", "elseif", "of", "catch", "finally", "handle", "ask", "tell",
];

impl Parser {
    /// Parser positioned at the first token of `source`
    pub fn new(source: SourceText) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token(true)?;
        let previous = Span::new(lexer.source().clone(), 0, 0);
        Ok(Self {
            lexer,
            current,
            previous,
            next_id: 0,
        })
    }

    /// Parse statements up to end of input
    pub fn parse_program(&mut self) -> ParseResult<Node> {
        let seq = self.parse_seq()?;
        if !self.current.is_eof() {
            return Err(self.error(ParserErrorKind::UnexpectedToken));
        }
        Ok(seq)
    }

    // Token plumbing

    fn advance(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next_token(true)?;
        let token = std::mem::replace(&mut self.current, next);
        self.previous = token.span.clone();
        Ok(token)
    }

    fn error(&self, kind: ParserErrorKind) -> ParseError {
        ParserError {
            kind,
            token: self.current.clone(),
        }
        .into()
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.current.is_keyword(word)
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        self.current.is_symbol(symbol)
    }

    fn eat_keyword(&mut self, word: &str) -> ParseResult<bool> {
        if self.at_keyword(word) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_symbol(&mut self, symbol: &str) -> ParseResult<bool> {
        if self.at_symbol(symbol) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_keyword(&mut self, word: &str, kind: ParserErrorKind) -> ParseResult<()> {
        if self.eat_keyword(word)? {
            Ok(())
        } else {
            Err(self.error(kind))
        }
    }

    fn expect_symbol(&mut self, symbol: &str, kind: ParserErrorKind) -> ParseResult<()> {
        if self.eat_symbol(symbol)? {
            Ok(())
        } else {
            Err(self.error(kind))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.current.kind {
            TokenKind::Ident => Ok(self.advance()?.text().to_string()),
            TokenKind::QuotedIdent => Ok(quoted_text(&self.advance()?)),
            _ => Err(self.error(ParserErrorKind::IdentExpected)),
        }
    }

    /// Whether a line break separates the previous token from the current one
    fn newline_before(&self) -> bool {
        let source = self.lexer.source().as_str();
        source
            .get(self.previous.end..self.current.span.begin)
            .is_some_and(|gap| gap.contains('\n'))
    }

    fn at_seq_end(&self) -> bool {
        self.current.is_eof()
            || (self.current.kind == TokenKind::Keyword
                && SEQ_TERMINATORS.contains(&self.current.text()))
    }

    fn node(&mut self, begin: &Span, kind: NodeKind) -> Node {
        let id = self.fresh_id();
        Node {
            id,
            span: begin.adjoin(&self.previous),
            kind,
        }
    }

    fn pat(&mut self, begin: &Span, kind: PatKind) -> Pat {
        let id = self.fresh_id();
        Pat {
            id,
            span: begin.adjoin(&self.previous),
            kind,
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    // Sequences and statements

    fn parse_seq(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let mut items = Vec::new();
        loop {
            while self.eat_symbol(";")? {}
            if self.at_seq_end() {
                break;
            }
            items.push(self.parse_stmt_or_expr()?);
        }
        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(self.node(&begin, NodeKind::Seq(items)))
    }

    fn parse_stmt_or_expr(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        if self.current.kind != TokenKind::Keyword {
            return self.parse_expr();
        }
        match self.current.text() {
            "var" => {
                self.advance()?;
                let decls = self.parse_decls()?;
                Ok(self.node(&begin, NodeKind::Var(decls)))
            }
            "for" => self.parse_for(),
            "while" => {
                self.advance()?;
                let cond = self.parse_expr()?;
                self.expect_keyword("do", ParserErrorKind::DoExpected)?;
                let body = self.parse_seq()?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                Ok(self.node(
                    &begin,
                    NodeKind::While {
                        cond: Box::new(cond),
                        body: Box::new(body),
                    },
                ))
            }
            "import" => self.parse_import(),
            "throw" => {
                self.advance()?;
                let error = self.parse_expr()?;
                Ok(self.node(&begin, NodeKind::Throw(Box::new(error))))
            }
            "break" => {
                self.advance()?;
                Ok(self.node(&begin, NodeKind::Break))
            }
            "continue" => {
                self.advance()?;
                Ok(self.node(&begin, NodeKind::Continue))
            }
            "skip" => {
                self.advance()?;
                Ok(self.node(&begin, NodeKind::Skip))
            }
            "return" => {
                self.advance()?;
                let value = if self.newline_before() || self.at_seq_end() || self.at_symbol(";") {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                Ok(self.node(&begin, NodeKind::Return(value)))
            }
            _ => self.parse_expr(),
        }
    }

    fn parse_decls(&mut self) -> ParseResult<Vec<VarDecl>> {
        let mut decls = Vec::new();
        loop {
            let pat = self.parse_annotated_pat()?;
            let value = if self.eat_symbol("=")? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            decls.push(VarDecl { pat, value });
            if !self.eat_symbol(",")? {
                return Ok(decls);
            }
        }
    }

    fn parse_for(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let pat = self.parse_pat()?;
        self.expect_keyword("in", ParserErrorKind::InExpected)?;
        let iter = self.parse_expr()?;
        self.expect_keyword("do", ParserErrorKind::DoExpected)?;
        let body = self.parse_seq()?;
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        Ok(self.node(
            &begin,
            NodeKind::For {
                pat,
                iter: Box::new(iter),
                body: Box::new(body),
            },
        ))
    }

    fn parse_import(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let mut qualifier = vec![self.expect_ident()?];
        if !self.at_symbol(".") {
            return Err(self.error(ParserErrorKind::UnexpectedToken));
        }
        let names = loop {
            if !self.eat_symbol(".")? {
                let last = qualifier.pop().unwrap_or_default();
                break vec![last];
            }
            if self.eat_symbol("{")? {
                let mut names = vec![self.expect_ident()?];
                while self.eat_symbol(",")? {
                    names.push(self.expect_ident()?);
                }
                self.expect_symbol("}", ParserErrorKind::RightBraceExpected)?;
                break names;
            }
            qualifier.push(self.expect_ident()?);
        };
        Ok(self.node(&begin, NodeKind::Import { qualifier, names }))
    }

    // Expressions

    /// Parse one expression
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let left = self.parse_or()?;
        if self.eat_symbol("=")? {
            let right = self.parse_expr()?;
            return Ok(self.node(
                &begin,
                NodeKind::Unify {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ));
        }
        if self.eat_symbol(":=")? {
            let right = self.parse_expr()?;
            return Ok(self.node(
                &begin,
                NodeKind::Assign {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let mut left = self.parse_and()?;
        while self.eat_symbol("||")? {
            let right = self.parse_and()?;
            left = self.node(&begin, NodeKind::Or(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let mut left = self.parse_binary(4)?;
        while self.eat_symbol("&&")? {
            let right = self.parse_binary(4)?;
            left = self.node(&begin, NodeKind::And(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn binary_op(&self) -> Option<BinOp> {
        if !matches!(self.current.kind, TokenKind::OneChar | TokenKind::TwoChar) {
            return None;
        }
        let op = match self.current.text() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    /// Left-associative binary operators at `min_prec` and above
    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let mut left = if min_prec >= 6 {
            self.parse_unary()?
        } else {
            self.parse_binary(min_prec + 1)?
        };
        while let Some(op) = self.binary_op().filter(|op| op.precedence() == min_prec) {
            self.advance()?;
            let right = if min_prec >= 6 {
                self.parse_unary()?
            } else {
                self.parse_binary(min_prec + 1)?
            };
            left = self.node(
                &begin,
                NodeKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let op = if self.at_symbol("-") {
            UnaryOp::Neg
        } else if self.at_symbol("!") {
            UnaryOp::Not
        } else if self.at_symbol("@") {
            UnaryOp::Deref
        } else {
            return self.parse_postfix();
        };
        self.advance()?;
        if op == UnaryOp::Neg {
            if let Some(literal) = self.negative_number()? {
                return Ok(self.node(&begin, NodeKind::Literal(literal)));
            }
        }
        let arg = self.parse_unary()?;
        Ok(self.node(
            &begin,
            NodeKind::Unary {
                op,
                arg: Box::new(arg),
            },
        ))
    }

    /// Fold a `-` just consumed into the number literal that follows it
    fn negative_number(&mut self) -> ParseResult<Option<Literal>> {
        let literal = match self.current.kind {
            TokenKind::Int => Literal::Int(format!("-{}", self.current.text())),
            TokenKind::Flt => Literal::Flt(format!("-{}", self.current.text())),
            TokenKind::Dec => Literal::Dec(format!("-{}", self.current.text())),
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(literal))
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_symbol(".")? {
                let feature = self.parse_select_feature()?;
                expr = self.node(
                    &begin,
                    NodeKind::Select {
                        rec: Box::new(expr),
                        feature,
                    },
                );
            } else if self.at_symbol("(") && !self.newline_before() {
                self.advance()?;
                let args =
                    self.parse_list(")", ParserErrorKind::RightParenExpected, Self::parse_expr)?;
                expr = self.node(
                    &begin,
                    NodeKind::Apply {
                        proc: Box::new(expr),
                        args,
                    },
                );
            } else if self.at_symbol("[") && !self.newline_before() {
                self.advance()?;
                let index = self.parse_expr()?;
                self.expect_symbol("]", ParserErrorKind::RightBracketExpected)?;
                expr = self.node(
                    &begin,
                    NodeKind::Index {
                        rec: Box::new(expr),
                        index: Box::new(index),
                    },
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_select_feature(&mut self) -> ParseResult<Literal> {
        let literal = match self.current.kind {
            // Keywords name features after `.`, as in `actor.ask(m)`
            TokenKind::Ident | TokenKind::Keyword => {
                Literal::Str(self.current.text().to_string())
            }
            TokenKind::QuotedIdent => Literal::Str(quoted_text(&self.current)),
            TokenKind::Str => Literal::Str(quoted_text(&self.current)),
            TokenKind::Int => Literal::Int(self.current.text().to_string()),
            _ => return Err(self.error(ParserErrorKind::FeatureExpected)),
        };
        self.advance()?;
        Ok(literal)
    }

    /// Comma-separated items up to `close`, which is consumed
    fn parse_list<T>(
        &mut self,
        close: &str,
        missing: ParserErrorKind,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        if self.eat_symbol(close)? {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if !self.eat_symbol(",")? {
                break;
            }
            if self.at_symbol(close) {
                break;
            }
        }
        self.expect_symbol(close, missing)?;
        Ok(items)
    }

    /// Literal at the current token, without consuming it
    fn current_literal(&self) -> Option<Literal> {
        let token = &self.current;
        let literal = match token.kind {
            TokenKind::Int => Literal::Int(token.text().to_string()),
            TokenKind::Flt => Literal::Flt(token.text().to_string()),
            TokenKind::Dec => Literal::Dec(token.text().to_string()),
            TokenKind::Str => Literal::Str(quoted_text(token)),
            TokenKind::Char => Literal::Char(char_value(token)),
            TokenKind::Keyword => match token.text() {
                "true" => Literal::Bool(true),
                "false" => Literal::Bool(false),
                "null" => Literal::Null,
                "nothing" => Literal::Nothing,
                "eof" => Literal::Eof,
                _ => return None,
            },
            _ => return None,
        };
        Some(literal)
    }

    /// Label candidate at the current token, if a `#` follows it
    fn parse_label(&mut self) -> ParseResult<Option<Literal>> {
        let label = match self.current.kind {
            TokenKind::Ident => Literal::Str(self.current.text().to_string()),
            TokenKind::QuotedIdent | TokenKind::Str => Literal::Str(quoted_text(&self.current)),
            TokenKind::Keyword if matches!(self.current.text(), "true" | "false") => {
                Literal::Bool(self.current.text() == "true")
            }
            _ => return Ok(None),
        };
        if !self.hash_follows() {
            return Ok(None);
        }
        self.advance()?;
        self.advance()?;
        Ok(Some(label))
    }

    /// Whether the token after the current one is `#`
    fn hash_follows(&self) -> bool {
        let source = self.lexer.source().as_str();
        source
            .get(self.current.span.end..)
            .map(str::trim_start)
            .is_some_and(|rest| rest.starts_with('#'))
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        if let Some(label) = self.parse_label()? {
            return self.parse_constructor(&begin, Some(label));
        }
        match self.current.kind {
            TokenKind::Ident => {
                let name = self.advance()?.text().to_string();
                return Ok(self.node(&begin, NodeKind::Ident(name)));
            }
            TokenKind::QuotedIdent => {
                let name = quoted_text(&self.advance()?);
                return Ok(self.node(&begin, NodeKind::Ident(name)));
            }
            _ => {}
        }
        if let Some(literal) = self.current_literal() {
            self.advance()?;
            return Ok(self.node(&begin, NodeKind::Literal(literal)));
        }
        if self.at_symbol("(") {
            self.advance()?;
            let expr = self.parse_expr()?;
            self.expect_symbol(")", ParserErrorKind::RightParenExpected)?;
            return Ok(expr);
        }
        if self.at_symbol("{") || self.at_symbol("[") {
            return self.parse_constructor(&begin, None);
        }
        if self.current.kind != TokenKind::Keyword {
            return Err(self.error(ParserErrorKind::ExprExpected));
        }
        match self.current.text() {
            "self" => {
                self.advance()?;
                Ok(self.node(&begin, NodeKind::SelfRef))
            }
            "begin" => {
                self.advance()?;
                let body = self.parse_seq()?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                Ok(self.node(&begin, NodeKind::Begin(Box::new(body))))
            }
            "local" => {
                self.advance()?;
                let decls = self.parse_decls()?;
                self.expect_keyword("in", ParserErrorKind::InExpected)?;
                let body = self.parse_seq()?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                Ok(self.node(
                    &begin,
                    NodeKind::Local {
                        decls,
                        body: Box::new(body),
                    },
                ))
            }
            "if" => self.parse_if(),
            "case" => self.parse_case(),
            "try" => self.parse_try(),
            "func" | "proc" => self.parse_proc(),
            "act" => {
                self.advance()?;
                let body = self.parse_seq()?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                Ok(self.node(&begin, NodeKind::Act(Box::new(body))))
            }
            "spawn" => {
                self.advance()?;
                self.expect_symbol("(", ParserErrorKind::LeftParenExpected)?;
                let cfg = self.parse_expr()?;
                self.expect_symbol(")", ParserErrorKind::RightParenExpected)?;
                Ok(self.node(&begin, NodeKind::Spawn(Box::new(cfg))))
            }
            "actor" => self.parse_actor(),
            _ => Err(self.error(ParserErrorKind::ExprExpected)),
        }
    }

    fn parse_constructor(&mut self, begin: &Span, label: Option<Literal>) -> ParseResult<Node> {
        if self.eat_symbol("{")? {
            let fields = self.parse_list("}", ParserErrorKind::RightBraceExpected, |parser| {
                let feature = parser.parse_feature()?;
                parser.expect_symbol(":", ParserErrorKind::ColonExpected)?;
                Ok((feature, parser.parse_expr()?))
            })?;
            return Ok(self.node(begin, NodeKind::Rec { label, fields }));
        }
        if self.eat_symbol("[")? {
            let values = self.parse_list("]", ParserErrorKind::RightBracketExpected, |parser| {
                if parser.at_symbol("...") {
                    return Err(parser.error(ParserErrorKind::PartialArityNotAllowed));
                }
                parser.parse_expr()
            })?;
            return Ok(self.node(begin, NodeKind::Tuple { label, values }));
        }
        Err(self.error(ParserErrorKind::LabelExpected))
    }

    fn parse_feature(&mut self) -> ParseResult<Literal> {
        if self.at_symbol("...") {
            return Err(self.error(ParserErrorKind::PartialArityNotAllowed));
        }
        let literal = match self.current.kind {
            TokenKind::Ident => Literal::Str(self.current.text().to_string()),
            TokenKind::QuotedIdent | TokenKind::Str => Literal::Str(quoted_text(&self.current)),
            TokenKind::Int => Literal::Int(self.current.text().to_string()),
            TokenKind::Char => Literal::Char(char_value(&self.current)),
            TokenKind::Keyword if matches!(self.current.text(), "true" | "false") => {
                Literal::Bool(self.current.text() == "true")
            }
            _ => return Err(self.error(ParserErrorKind::FeatureExpected)),
        };
        self.advance()?;
        Ok(literal)
    }

    fn parse_if(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let mut branches = Vec::new();
        loop {
            let cond = self.parse_expr()?;
            self.expect_keyword("then", ParserErrorKind::ThenExpected)?;
            let body = self.parse_seq()?;
            branches.push((cond, body));
            if !self.eat_keyword("elseif")? {
                break;
            }
        }
        let otherwise = if self.eat_keyword("else")? {
            Some(Box::new(self.parse_seq()?))
        } else {
            None
        };
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        Ok(self.node(
            &begin,
            NodeKind::If {
                branches,
                otherwise,
            },
        ))
    }

    fn parse_clause(
        &mut self,
        body_keyword: &str,
        missing: ParserErrorKind,
    ) -> ParseResult<CaseClause> {
        let pat = self.parse_pat()?;
        let guard = if self.eat_keyword("when")? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_keyword(body_keyword, missing)?;
        let body = self.parse_seq()?;
        Ok(CaseClause { pat, guard, body })
    }

    fn parse_case(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let arg = self.parse_expr()?;
        if !self.at_keyword("of") {
            return Err(self.error(ParserErrorKind::OfExpected));
        }
        let mut clauses = Vec::new();
        while self.eat_keyword("of")? {
            clauses.push(self.parse_clause("then", ParserErrorKind::ThenExpected)?);
        }
        let otherwise = if self.eat_keyword("else")? {
            Some(Box::new(self.parse_seq()?))
        } else {
            None
        };
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        Ok(self.node(
            &begin,
            NodeKind::Case {
                arg: Box::new(arg),
                clauses,
                otherwise,
            },
        ))
    }

    fn parse_try(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let body = self.parse_seq()?;
        let mut catches = Vec::new();
        while self.eat_keyword("catch")? {
            catches.push(self.parse_clause("then", ParserErrorKind::ThenExpected)?);
        }
        let finally = if self.eat_keyword("finally")? {
            Some(Box::new(self.parse_seq()?))
        } else {
            None
        };
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        Ok(self.node(
            &begin,
            NodeKind::Try {
                body: Box::new(body),
                catches,
                finally,
            },
        ))
    }

    fn parse_formals(&mut self) -> ParseResult<Vec<Pat>> {
        self.expect_symbol("(", ParserErrorKind::LeftParenExpected)?;
        self.parse_list(")", ParserErrorKind::RightParenExpected, Self::parse_annotated_pat)
    }

    fn parse_optional_name(&mut self) -> ParseResult<Option<String>> {
        match self.current.kind {
            TokenKind::Ident | TokenKind::QuotedIdent => Ok(Some(self.expect_ident()?)),
            _ => Ok(None),
        }
    }

    fn parse_proc(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        let is_func = self.advance()?.text() == "func";
        let name = self.parse_optional_name()?;
        let formals = self.parse_formals()?;
        let ret_anno = if is_func && self.eat_symbol("->")? {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect_keyword("in", ParserErrorKind::InExpected)?;
        let body = Box::new(self.parse_seq()?);
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        let kind = if is_func {
            NodeKind::Func {
                name,
                formals,
                ret_anno,
                body,
            }
        } else {
            NodeKind::Proc {
                name,
                formals,
                body,
            }
        };
        Ok(self.node(&begin, kind))
    }

    fn parse_actor(&mut self) -> ParseResult<Node> {
        let begin = self.current.span.clone();
        self.advance()?;
        let name = self.parse_optional_name()?;
        let formals = self.parse_formals()?;
        self.expect_keyword("in", ParserErrorKind::InExpected)?;
        let mut items = Vec::new();
        loop {
            while self.eat_symbol(";")? {}
            if self.at_keyword("end") || self.current.is_eof() {
                break;
            }
            let handle = self.eat_keyword("handle")?;
            if self.eat_keyword("ask")? {
                let clause = self.parse_clause("in", ParserErrorKind::InExpected)?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                items.push(ActorItem::Ask(clause));
            } else if self.eat_keyword("tell")? {
                let clause = self.parse_clause("in", ParserErrorKind::InExpected)?;
                self.expect_keyword("end", ParserErrorKind::EndExpected)?;
                items.push(ActorItem::Tell(clause));
            } else if handle {
                return Err(self.error(ParserErrorKind::AskOrTellExpected));
            } else {
                items.push(ActorItem::Stmt(self.parse_stmt_or_expr()?));
            }
        }
        self.expect_keyword("end", ParserErrorKind::EndExpected)?;
        Ok(self.node(
            &begin,
            NodeKind::Actor {
                name,
                formals,
                items,
            },
        ))
    }

    fn parse_type(&mut self) -> ParseResult<TypeAnno> {
        let name = match self.current.kind {
            TokenKind::Ident | TokenKind::QuotedIdent => self.expect_ident()?,
            _ => return Err(self.error(ParserErrorKind::TypeExpected)),
        };
        let params = if self.eat_symbol("[")? {
            self.parse_list("]", ParserErrorKind::RightBracketExpected, Self::parse_type)?
        } else {
            Vec::new()
        };
        Ok(TypeAnno { name, params })
    }

    // Patterns

    fn parse_annotated_pat(&mut self) -> ParseResult<Pat> {
        let mut pat = self.parse_pat()?;
        if let PatKind::Ident { anno, .. } = &mut pat.kind {
            if self.eat_symbol(":")? {
                *anno = Some(self.parse_type()?);
            }
        }
        Ok(pat)
    }

    fn parse_pat(&mut self) -> ParseResult<Pat> {
        let begin = self.current.span.clone();
        if let Some(label) = self.parse_label()? {
            return self.parse_compound_pat(&begin, Some(label));
        }
        match self.current.kind {
            TokenKind::Ident if self.current.text() == "_" => {
                self.advance()?;
                return Ok(self.pat(&begin, PatKind::Anon));
            }
            TokenKind::Ident | TokenKind::QuotedIdent => {
                let name = self.expect_ident()?;
                return Ok(self.pat(&begin, PatKind::Ident { name, anno: None }));
            }
            _ => {}
        }
        if self.eat_symbol("~")? {
            let name = self.expect_ident()?;
            return Ok(self.pat(&begin, PatKind::Escaped(name)));
        }
        if self.eat_symbol("-")? {
            return match self.negative_number()? {
                Some(literal) => Ok(self.pat(&begin, PatKind::Literal(literal))),
                None => Err(self.error(ParserErrorKind::PatExpected)),
            };
        }
        if let Some(literal) = self.current_literal() {
            self.advance()?;
            return Ok(self.pat(&begin, PatKind::Literal(literal)));
        }
        if self.at_symbol("{") || self.at_symbol("[") {
            return self.parse_compound_pat(&begin, None);
        }
        Err(self.error(ParserErrorKind::PatExpected))
    }

    fn parse_compound_pat(&mut self, begin: &Span, label: Option<Literal>) -> ParseResult<Pat> {
        let (close, missing) = if self.eat_symbol("{")? {
            ("}", ParserErrorKind::RightBraceExpected)
        } else if self.eat_symbol("[")? {
            ("]", ParserErrorKind::RightBracketExpected)
        } else {
            return Err(self.error(ParserErrorKind::LabelExpected));
        };
        let is_rec = close == "}";
        let mut fields = Vec::new();
        let mut values = Vec::new();
        let mut partial = false;
        if !self.at_symbol(close) {
            loop {
                if self.eat_symbol("...")? {
                    partial = true;
                    break;
                }
                if is_rec {
                    let feature = self.parse_feature()?;
                    self.expect_symbol(":", ParserErrorKind::ColonExpected)?;
                    fields.push((feature, self.parse_pat()?));
                } else {
                    values.push(self.parse_pat()?);
                }
                if !self.eat_symbol(",")? {
                    break;
                }
            }
        }
        self.expect_symbol(close, missing)?;
        let kind = if is_rec {
            PatKind::Rec {
                label,
                fields,
                partial,
            }
        } else {
            PatKind::Tuple {
                label,
                values,
                partial,
            }
        };
        Ok(self.pat(begin, kind))
    }
}

/// Decoded body of a string or quoted identifier token
fn quoted_text(token: &Token) -> String {
    let text = token.text();
    let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
    unescape(inner)
}

/// Decoded value of a character token (`&c`)
fn char_value(token: &Token) -> char {
    unescape(token.text().get(1..).unwrap_or(""))
        .chars()
        .next()
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(source: &str) -> NodeKind {
        parse(source).unwrap().kind
    }

    fn err(source: &str) -> ParserErrorKind {
        match parse(source).unwrap_err() {
            ParseError::Parser(err) => err.kind,
            other => panic!("expected a parser error, got {other}"),
        }
    }

    fn int(text: &str) -> NodeKind {
        NodeKind::Literal(Literal::Int(text.into()))
    }

    #[test]
    fn test_precedence() {
        let NodeKind::BinOp { op, left, right } = kind("1 + 2 * 3") else {
            panic!("expected a binary operation");
        };
        assert_eq!(op, BinOp::Add);
        assert_eq!(left.kind, int("1"));
        assert!(matches!(right.kind, NodeKind::BinOp { op: BinOp::Mul, .. }));

        let NodeKind::Or(left, _) = kind("a && b || c") else {
            panic!("expected ||");
        };
        assert!(matches!(left.kind, NodeKind::And(..)));
    }

    #[test]
    fn test_negative_literals_fold() {
        assert_eq!(kind("-5"), int("-5"));
        assert!(matches!(kind("-x"), NodeKind::Unary { op: UnaryOp::Neg, .. }));
        let NodeKind::BinOp { right, .. } = kind("a - -1") else {
            panic!("expected subtraction");
        };
        assert_eq!(right.kind, int("-1"));
    }

    #[test]
    fn test_newline_breaks_postfix() {
        assert!(matches!(kind("f(1)"), NodeKind::Apply { .. }));
        let NodeKind::Seq(items) = kind("f\n(1)") else {
            panic!("expected two statements");
        };
        assert_eq!(items.len(), 2);
        let NodeKind::Seq(items) = kind("x\n[1, 2]") else {
            panic!("expected two statements");
        };
        assert!(matches!(items[1].kind, NodeKind::Tuple { .. }));
        assert!(matches!(kind("t[0]"), NodeKind::Index { .. }));
    }

    #[test]
    fn test_records_and_labels() {
        let NodeKind::Rec { label, fields } = kind("'p'#{a: 1, 'b c': 2, 0: 3}") else {
            panic!("expected a record");
        };
        assert_eq!(label, Some(Literal::Str("p".into())));
        let features: Vec<Literal> = fields.into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            features,
            vec![
                Literal::Str("a".into()),
                Literal::Str("b c".into()),
                Literal::Int("0".into())
            ]
        );
        let NodeKind::Tuple { label, values } = kind("point#[1, 2]") else {
            panic!("expected a tuple");
        };
        assert_eq!(label, Some(Literal::Str("point".into())));
        assert_eq!(values.len(), 2);
        assert_eq!(err("[1, ...]"), ParserErrorKind::PartialArityNotAllowed);
    }

    #[test]
    fn test_keyword_features_after_dot() {
        let NodeKind::Apply { proc, args } = kind("x.ask(1)") else {
            panic!("expected an application");
        };
        assert_eq!(args.len(), 1);
        let NodeKind::Select { feature, .. } = proc.kind else {
            panic!("expected a select");
        };
        assert_eq!(feature, Literal::Str("ask".into()));
        assert!(matches!(kind("x.tell('m')"), NodeKind::Apply { .. }));
        assert_eq!(err("x.+"), ParserErrorKind::FeatureExpected);
    }

    #[test]
    fn test_patterns() {
        let NodeKind::Case { clauses, otherwise, .. } =
            kind("case x of [a, {k: ~y, ...}] then a of 'ping' when b then 1 else 2 end")
        else {
            panic!("expected case");
        };
        assert!(otherwise.is_some());
        assert_eq!(clauses.len(), 2);
        let PatKind::Tuple { values, partial, .. } = &clauses[0].pat.kind else {
            panic!("expected a tuple pattern");
        };
        assert!(!partial);
        assert!(matches!(
            &values[1].kind,
            PatKind::Rec { partial: true, .. }
        ));
        assert!(clauses[1].guard.is_some());
    }

    #[test]
    fn test_statements() {
        let NodeKind::Seq(items) = kind(
            "var x: Int32 = 1, y\nimport system.{Cell, Iter}\nwhile x < 3 do x = 1 end",
        ) else {
            panic!("expected a sequence");
        };
        let NodeKind::Var(decls) = &items[0].kind else {
            panic!("expected var");
        };
        assert_eq!(decls.len(), 2);
        assert!(matches!(
            &decls[0].pat.kind,
            PatKind::Ident { anno: Some(_), .. }
        ));
        assert_eq!(
            items[1].kind,
            NodeKind::Import {
                qualifier: vec!["system".into()],
                names: vec!["Cell".into(), "Iter".into()],
            }
        );
        assert!(matches!(items[2].kind, NodeKind::While { .. }));
    }

    #[test]
    fn test_return_takes_same_line_value() {
        let NodeKind::Func { body, .. } = kind("func f(a) in return\na end") else {
            panic!("expected func");
        };
        let NodeKind::Seq(items) = body.kind else {
            panic!("expected body sequence");
        };
        assert_eq!(items[0].kind, NodeKind::Return(None));
        assert!(matches!(
            kind("func g() -> Int32 in return 1 end"),
            NodeKind::Func { ret_anno: Some(_), .. }
        ));
    }

    #[test]
    fn test_actor_items() {
        let NodeKind::Actor { name, items, .. } = kind(
            "actor Echo() in var n = 0 handle ask 'ping' in 'pong' end tell m in skip end end",
        ) else {
            panic!("expected actor");
        };
        assert_eq!(name.as_deref(), Some("Echo"));
        assert!(matches!(items[0], ActorItem::Stmt(_)));
        assert!(matches!(items[1], ActorItem::Ask(_)));
        assert!(matches!(items[2], ActorItem::Tell(_)));
        assert_eq!(
            err("actor A() in handle 1 end"),
            ParserErrorKind::AskOrTellExpected
        );
    }

    #[test]
    fn test_expected_token_errors() {
        assert_eq!(err("if x then 1"), ParserErrorKind::EndExpected);
        assert_eq!(err("if x 1 end"), ParserErrorKind::ThenExpected);
        assert_eq!(err("while x 1 end"), ParserErrorKind::DoExpected);
        assert_eq!(err("case x then 1 end"), ParserErrorKind::OfExpected);
        assert_eq!(err("f(1"), ParserErrorKind::RightParenExpected);
        assert_eq!(err("{a 1}"), ParserErrorKind::ColonExpected);
        assert_eq!(err("1 +"), ParserErrorKind::ExprExpected);
        assert_eq!(err("x.+"), ParserErrorKind::FeatureExpected);
        assert_eq!(err("spawn x"), ParserErrorKind::LeftParenExpected);
        assert_eq!(err("func f(a) -> in a end"), ParserErrorKind::TypeExpected);
        assert_eq!(err("1 end"), ParserErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_spans_cover_children() {
        let node = parse("  a + b").unwrap();
        assert_eq!(node.span.text(), "a + b");
    }
}
