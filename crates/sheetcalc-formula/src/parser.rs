//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with the usual operator
//! precedence. Parsing is a pure function of the text: sheet names stay
//! unresolved in the tree and are looked up by the compiler.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use sheetcalc_core::{CellAddress, CellError, CellRange};

/// Parse a formula string into an AST
///
/// A leading `=` is optional. Error positions are byte offsets into the text
/// after the `=` and surrounding whitespace are stripped.
///
/// # Example
/// ```rust
/// use sheetcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("SUM('Q1 Data'!A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// assert!(parse_formula("=1+").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let trimmed = formula.trim();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    if body.is_empty() {
        return Err(FormulaError::parse(0, "Empty formula"));
    }

    let mut parser = FormulaParser::new(body)?;
    let expr = parser.parse_expression()?;

    if *parser.current_token() != Token::Eof {
        return Err(parser.unexpected("end of formula"));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name or defined name
    CellRef(String),    // Cell reference like A1, $A$1
    SheetRef(String),   // Sheet prefix like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::String(s) => format!("string \"{s}\""),
            Token::Boolean(b) => format!("{}", if *b { "TRUE" } else { "FALSE" }),
            Token::Error(e) => format!("error {e}"),
            Token::Identifier(s) => format!("identifier '{s}'"),
            Token::CellRef(s) => format!("reference '{s}'"),
            Token::SheetRef(s) => format!("sheet prefix '{s}!'"),
            Token::Eof => "end of formula".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Percent => "%",
            Token::Ampersand => "&",
            Token::Equal => "=",
            Token::NotEqual => "<>",
            Token::LessThan => "<",
            Token::LessEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterEqual => ">=",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            _ => "?",
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    token_start: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            token_start: 0,
            current_token: Token::Eof,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            '=' => Some(Token::Equal),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match c {
            '<' => {
                self.advance();
                Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                })
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::GreaterThan)
                }
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            '#' => self.scan_error(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => Ok(self.scan_identifier_or_ref()),
            other => Err(FormulaError::parse(
                self.pos,
                format!("Unexpected character '{other}'"),
            )),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::parse(start, "Unterminated string literal")),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::parse(start, "Unterminated sheet name")),
            }
        }

        if name.is_empty() {
            return Err(FormulaError::parse(start, "Empty sheet name"));
        }
        if self.peek_char() != Some('!') {
            return Err(FormulaError::parse(
                self.pos,
                "Expected '!' after quoted sheet name",
            ));
        }
        self.advance();
        Ok(Token::SheetRef(name))
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // '#'
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_'))
        {
            self.advance();
        }
        // Error literals end in '!' or '?', except #N/A
        if matches!(self.peek_char(), Some('!') | Some('?')) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        CellError::from_str(text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::parse(start, format!("Unknown error literal '{text}'")))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.skip_digits();

        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let exp_digit = match self.peek_char_at(1) {
                Some('+') | Some('-') => self.peek_char_at(2),
                other => other,
            };
            if exp_digit.map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
                if matches!(self.peek_char(), Some('+') | Some('-')) {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::parse(start, format!("Invalid number '{text}'")))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        // A name followed by '(' is always a call: TRUE(), LOG10(100)
        let is_call = self.peek_char() == Some('(');
        if !is_call {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
            if is_cell_reference(text) {
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> FormulaResult<()> {
        if *self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> FormulaError {
        FormulaError::parse(
            self.token_start,
            format!(
                "Expected {wanted}, found {}",
                self.current_token().describe()
            ),
        )
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^ (left associative)
    // 6. Unary: prefix -, +, postfix %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.consume()?;
            let right = self.parse_concatenation()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while *self.current_token() == Token::Ampersand {
            self.consume()?;
            let right = self.parse_additive()?;
            left = FormulaExpr::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.consume()?;
            let right = self.parse_exponent()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        while *self.current_token() == Token::Caret {
            self.consume()?;
            let right = self.parse_unary()?;
            left = FormulaExpr::binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume()?;
                let operand = self.parse_unary()?;
                return Ok(FormulaExpr::unary(UnaryOperator::Negate, operand));
            }
            Token::Plus => {
                self.consume()?;
                return self.parse_unary();
            }
            _ => {}
        }

        let mut expr = self.parse_range()?;
        while *self.current_token() == Token::Percent {
            self.consume()?;
            expr = FormulaExpr::unary(UnaryOperator::Percent, expr);
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if *self.current_token() != Token::Colon {
            return Ok(left);
        }

        let colon_at = self.token_start;
        self.consume()?;
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                let sheet = match (start.sheet, end.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => {
                        return Err(FormulaError::parse(
                            colon_at,
                            "Range references must be on the same sheet",
                        ))
                    }
                    (Some(a), _) => Some(a),
                    (None, b) => b,
                };
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            _ => Err(FormulaError::parse(
                colon_at,
                "Range operator requires cell references on both sides",
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let start = self.token_start;
        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => {
                let cell_start = self.token_start;
                match self.consume()? {
                    Token::CellRef(text) => Self::cell_reference(Some(sheet), &text, cell_start),
                    _ => Err(FormulaError::parse(
                        start,
                        format!("Expected cell reference after '{sheet}!'"),
                    )),
                }
            }

            Token::CellRef(text) => Self::cell_reference(None, &text, start),

            Token::Identifier(name) => {
                if *self.current_token() == Token::LeftParen {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            other => Err(FormulaError::parse(
                start,
                format!("Unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if *self.current_token() != Token::RightBrace {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume()?;
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume()?;
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => return Err(self.unexpected("',' ';' or '}' in array")),
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect(Token::RightBrace)?;

        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(FormulaError::parse(
                self.token_start,
                "Array constant rows must have the same length",
            ));
        }

        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(Token::LeftParen)?;

        let mut args = Vec::new();
        if *self.current_token() != Token::RightParen {
            args.push(self.parse_expression()?);
            while *self.current_token() == Token::Comma {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect(Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    fn cell_reference(
        sheet: Option<String>,
        text: &str,
        position: usize,
    ) -> FormulaResult<FormulaExpr> {
        let address = CellAddress::parse(text).map_err(|e| {
            FormulaError::parse(position, format!("Invalid cell reference '{text}': {e}"))
        })?;
        Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
    }
}

/// `[$]LETTERS[$]DIGITS` with 1-3 column letters
fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.chars().take_while(char::is_ascii_alphabetic).count();
    if !(1..=3).contains(&letters) {
        return false;
    }
    let rest = &rest[letters..];
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=0.25").unwrap(), FormulaExpr::Number(0.25));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_leading_equals_is_optional() {
        assert_eq!(parse_formula("1+2").unwrap(), parse_formula("=1+2").unwrap());
        assert_eq!(parse_formula("  = 7 ").unwrap(), FormulaExpr::Number(7.0));
    }

    #[test]
    fn test_parse_string_with_escaped_quotes() {
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
    }

    #[test]
    fn test_parse_boolean_and_error_literals() {
        assert_eq!(parse_formula("=true").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=#N/A").unwrap(), FormulaExpr::Error(CellError::Na));
        assert_eq!(parse_formula("=#DIV/0!").unwrap(), FormulaExpr::Error(CellError::Div0));
        assert_eq!(parse_formula("=#NAME?").unwrap(), FormulaExpr::Error(CellError::Name));
        assert!(matches!(
            parse_formula("=TRUE()").unwrap(),
            FormulaExpr::Function { ref name, ref args } if name == "TRUE" && args.is_empty()
        ));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse_formula("=1+2*3").unwrap().to_string(), "(1+(2*3))");
        assert_eq!(parse_formula("=(1+2)*3").unwrap().to_string(), "((1+2)*3)");
        assert_eq!(parse_formula("=2^3^2").unwrap().to_string(), "((2^3)^2)");
        assert_eq!(parse_formula("=1&2=\"12\"").unwrap().to_string(), "((1&2)=\"12\")");
        assert_eq!(parse_formula("=-2^2").unwrap().to_string(), "(-2^2)");
        assert_eq!(parse_formula("=50%*2").unwrap().to_string(), "(50%*2)");
    }

    #[test]
    fn test_parse_cell_references() {
        match parse_formula("=$B$2").unwrap() {
            FormulaExpr::CellRef(r) => {
                assert_eq!((r.address.row, r.address.col), (1, 1));
                assert!(r.address.row_absolute && r.address.col_absolute);
                assert_eq!(r.sheet, None);
            }
            other => panic!("expected CellRef, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sheet_qualified_range() {
        match parse_formula("=Sheet2!A1:B3").unwrap() {
            FormulaExpr::RangeRef(r) => {
                assert_eq!(r.sheet.as_deref(), Some("Sheet2"));
                assert_eq!(r.range, CellRange::parse("A1:B3").unwrap());
            }
            other => panic!("expected RangeRef, got {other:?}"),
        }

        match parse_formula("='My ''Q1'' Sheet'!C5").unwrap() {
            FormulaExpr::CellRef(r) => assert_eq!(r.sheet.as_deref(), Some("My 'Q1' Sheet")),
            other => panic!("expected CellRef, got {other:?}"),
        }

        assert!(parse_formula("=Sheet1!A1:Sheet2!B2").is_err());
    }

    #[test]
    fn test_parse_function_calls() {
        let ast = parse_formula("=sum(A1:A10, 2, max(1,2))").unwrap();
        match ast {
            FormulaExpr::Function { name, args } => {
                assert_eq!(name, "SUM");
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[0], FormulaExpr::RangeRef(_)));
            }
            other => panic!("expected Function, got {other:?}"),
        }

        assert!(matches!(
            parse_formula("=LOG10(100)").unwrap(),
            FormulaExpr::Function { ref name, .. } if name == "LOG10"
        ));
    }

    #[test]
    fn test_parse_name_reference() {
        assert_eq!(
            parse_formula("=TaxRate*2").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Multiply,
                FormulaExpr::NameRef("TaxRate".into()),
                FormulaExpr::Number(2.0)
            )
        );
    }

    #[test]
    fn test_parse_array() {
        match parse_formula("={1,2;3,4}").unwrap() {
            FormulaExpr::Array(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1], vec![FormulaExpr::Number(3.0), FormulaExpr::Number(4.0)]);
            }
            other => panic!("expected Array, got {other:?}"),
        }
        assert!(parse_formula("={1,2;3}").is_err());
    }

    #[test]
    fn test_error_positions() {
        let err = parse_formula("=1+)").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 2, .. }), "{err}");

        let err = parse_formula("=SUM(1,2").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 7, .. }), "{err}");

        let err = parse_formula("=\"open").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 0, .. }), "{err}");

        let err = parse_formula("=1 2").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 2, .. }), "{err}");

        let err = parse_formula("=Sheet1!A0").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 7, .. }), "{err}");

        let err = parse_formula("=A0").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 0, .. }), "{err}");

        assert!(parse_formula("=").is_err());
        assert!(parse_formula("=A1 @ 2").is_err());
        assert!(parse_formula("=#BOGUS!").is_err());
    }

    #[test]
    fn test_range_requires_references() {
        assert!(parse_formula("=1:2").is_err());
    }

    #[test]
    fn test_is_cell_reference() {
        assert!(is_cell_reference("A1"));
        assert!(is_cell_reference("$XFD$1048576"));
        assert!(!is_cell_reference("LOG10A"));
        assert!(!is_cell_reference("ABCD1"));
        assert!(!is_cell_reference("A"));
    }
}
