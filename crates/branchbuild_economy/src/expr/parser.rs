//! Recursive-descent parser for the expression language.
//!
//! Precedence, lowest first: ternary, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix (member, index, call).

use super::lexer::{SpannedToken, Token};
use super::{BinaryOp, Expr, ExprError, UnaryOp, MAX_EXPR_NESTING};

pub(super) struct Parser<'a> {
    tokens: Vec<SpannedToken<'a>>,
    index: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(tokens: Vec<SpannedToken<'a>>) -> Self {
        Self { tokens, index: 0, nesting: 0 }
    }

    pub(super) fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.parse_conditional()
    }

    pub(super) fn expect_eof(&self) -> Result<(), ExprError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(ExprError::TrailingInput { position: self.current().position })
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.parse_or()?;
        if !self.matches("?") {
            return Ok(test);
        }
        let position = self.current().position;
        self.with_nesting(position, |parser| {
            let then = parser.parse_conditional()?;
            parser.expect(":", "`:` in conditional")?;
            let otherwise = parser.parse_conditional()?;
            Ok(Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)))
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.matches("||") {
            let right = self.parse_and()?;
            left = Expr::Logical(false, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;
        while self.matches("&&") {
            let right = self.parse_equality()?;
            left = Expr::Logical(true, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::LooseEq),
                ("!=", BinaryOp::LooseNe),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::parse_unary,
        )
    }

    /// Left-associative loop over one precedence level.
    fn parse_binary_level(
        &mut self,
        ops: &[(&'static str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        'outer: loop {
            for &(spelling, op) in ops {
                if self.matches(spelling) {
                    let right = next(self)?;
                    left = Expr::Binary(op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.matches("!") {
            UnaryOp::Not
        } else if self.matches("-") {
            UnaryOp::Neg
        } else if self.matches("+") {
            UnaryOp::Plus
        } else {
            return self.parse_postfix();
        };
        let position = self.current().position;
        self.with_nesting(position, |parser| {
            let operand = parser.parse_unary()?;
            Ok(Expr::Unary(op, Box::new(operand)))
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(".") {
                let SpannedToken { token, position } = self.current().clone();
                let Token::Ident(name) = token else {
                    return Err(ExprError::UnexpectedToken {
                        expected: "property name after `.`",
                        found: self.describe_current(),
                        position,
                    });
                };
                self.advance();
                expr = Expr::Member(Box::new(expr), name.to_string());
            } else if self.matches("[") {
                let position = self.current().position;
                let key = self.with_nesting(position, |parser| {
                    let key = parser.parse_expression()?;
                    parser.expect("]", "`]`")?;
                    Ok(key)
                })?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else if self.matches("(") {
                let position = self.current().position;
                let args = self.with_nesting(position, Self::parse_arguments)?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.matches(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.matches(",") {
                continue;
            }
            self.expect(")", "`)` after arguments")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let SpannedToken { token, position } = self.current().clone();
        match token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Str(text))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(match name {
                    "true" => Expr::Bool(true),
                    "false" => Expr::Bool(false),
                    "null" => Expr::Null,
                    "undefined" => Expr::Undefined,
                    _ => Expr::Ident(name.to_string()),
                })
            }
            Token::Punct("(") => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let inner = parser.parse_expression()?;
                    parser.expect(")", "`)`")?;
                    Ok(inner)
                })
            }
            Token::Punct(_) | Token::Eof => Err(ExprError::UnexpectedToken {
                expected: "value or `(`",
                found: self.describe_current(),
                position,
            }),
        }
    }

    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPR_NESTING {
            return Err(ExprError::NestingTooDeep { max_depth: MAX_EXPR_NESTING, position });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    fn expect(&mut self, spelling: &'static str, expected: &'static str) -> Result<(), ExprError> {
        if self.matches(spelling) {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    fn matches(&mut self, spelling: &str) -> bool {
        if matches!(self.current().token, Token::Punct(p) if p == spelling) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current(&self) -> &SpannedToken<'a> {
        // The lexer always terminates the stream with Eof and advance() never passes it.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Ident(name) => (*name).to_string(),
            Token::Number(n) => n.to_string(),
            Token::Str(text) => format!("'{text}'"),
            Token::Punct(p) => (*p).to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}
