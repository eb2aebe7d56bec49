//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{arg, cell_result, number, number_or, text, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use regex::{Regex, RegexBuilder};
use sheetcalc_core::CellError;

/// Longest string a cell can hold
const MAX_TEXT_LEN: usize = 32_767;

/// Non-negative character count argument
fn count(value: &FormulaValue) -> CellResult<usize> {
    let n = number(value)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

fn string(value: String) -> CellResult<FormulaValue> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(CellError::Value);
    }
    Ok(FormulaValue::String(value))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::Number(text(arg(args, 0))?.chars().count() as f64)))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let n = match args.get(1) {
            Some(v) => count(v)?,
            None => 1,
        };
        Ok(FormulaValue::String(s.chars().take(n).collect()))
    })
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let n = match args.get(1) {
            Some(v) => count(v)?,
            None => 1,
        };
        let skip = s.chars().count().saturating_sub(n);
        Ok(FormulaValue::String(s.chars().skip(skip).collect()))
    })
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let start = number(arg(args, 1))?.trunc();
        let n = count(arg(args, 2))?;
        if start < 1.0 {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::String(
            s.chars().skip(start as usize - 1).take(n).collect(),
        ))
    })
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::String(text(arg(args, 0))?.to_uppercase())))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::String(text(arg(args, 0))?.to_lowercase())))
}

/// TRIM(text) - strips leading and trailing spaces and collapses inner runs
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let trimmed: Vec<&str> = s.split(' ').filter(|part| !part.is_empty()).collect();
        Ok(FormulaValue::String(trimmed.join(" ")))
    })
}

/// CONCATENATE(text1, [text2], ...) - scalar arguments only
pub fn fn_concatenate(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mut out = String::new();
        for value in args {
            out.push_str(&text(value)?);
        }
        string(out)
    })
}

/// CONCAT(text1, [text2], ...) - ranges contribute every cell
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mut out = String::new();
        for value in args.iter().flat_map(FormulaValue::flatten) {
            out.push_str(&text(value)?);
        }
        string(out)
    })
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let times = count(arg(args, 1))?;
        if s.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::String(s.repeat(times)))
    })
}

/// Byte offset of the 1-based character position `start` in `s`
///
/// `start` may point one past the end. Anything else is `#VALUE!`.
fn start_offset(s: &str, start: f64) -> CellResult<usize> {
    let start = start.trunc();
    let len = s.chars().count();
    if start < 1.0 || start > (len + 1) as f64 {
        return Err(CellError::Value);
    }
    let index = start as usize - 1;
    Ok(s.char_indices().nth(index).map_or(s.len(), |(offset, _)| offset))
}

fn char_position(s: &str, byte_offset: usize) -> FormulaValue {
    FormulaValue::Number((s[..byte_offset].chars().count() + 1) as f64)
}

/// FIND(find_text, within_text, [start_num]) - case-sensitive, no wildcards
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let needle = text(arg(args, 0))?;
        let haystack = text(arg(args, 1))?;
        let offset = start_offset(&haystack, number_or(args, 2, 1.0)?)?;
        haystack[offset..]
            .find(&needle)
            .map(|found| char_position(&haystack, offset + found))
            .ok_or(CellError::Value)
    })
}

/// Case-insensitive regex for a wildcard pattern: `*` is any run, `?` any
/// single character, `~` escapes the next character
pub(crate) fn wildcard_regex(pattern: &str, anchored: bool) -> CellResult<Regex> {
    let mut source = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '~' => match chars.next() {
                Some(escaped) => source.push_str(&regex::escape(&escaped.to_string())),
                None => source.push_str(&regex::escape("~")),
            },
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    if anchored {
        source = format!("^(?:{source})$");
    }
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|_| CellError::Value)
}

/// SEARCH(find_text, within_text, [start_num]) - case-insensitive, wildcards
pub fn fn_search(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let needle = text(arg(args, 0))?;
        let haystack = text(arg(args, 1))?;
        let offset = start_offset(&haystack, number_or(args, 2, 1.0)?)?;
        let re = wildcard_regex(&needle, false)?;
        re.find_at(&haystack, offset)
            .map(|m| char_position(&haystack, m.start()))
            .ok_or(CellError::Value)
    })
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let s = text(arg(args, 0))?;
        let old = text(arg(args, 1))?;
        let new = text(arg(args, 2))?;

        if old.is_empty() {
            return Ok(FormulaValue::String(s));
        }

        let result = match args.get(3) {
            None => s.replace(&old, &new),
            Some(instance) => {
                let instance = number(instance)?.trunc();
                if instance < 1.0 {
                    return Err(CellError::Value);
                }
                match s.match_indices(&old).nth(instance as usize - 1) {
                    Some((at, _)) => format!("{}{}{}", &s[..at], new, &s[at + old.len()..]),
                    None => s,
                }
            }
        };
        string(result)
    })
}

/// EXACT(text1, text2) - case-sensitive comparison
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::Boolean(text(arg(args, 0))? == text(arg(args, 1))?)))
}

/// VALUE(text) - converts text that looks like a number
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| match arg(args, 0) {
        FormulaValue::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaValue::Empty => Ok(FormulaValue::Number(0.0)),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::String(s) => parse_number_text(s).map(FormulaValue::Number),
        _ => Err(CellError::Value),
    })
}

fn parse_number_text(s: &str) -> CellResult<f64> {
    let trimmed = s.trim();
    let (body, scale) = match trimmed.strip_suffix('%') {
        Some(body) => (body.trim_end(), 0.01),
        None => (trimmed, 1.0),
    };
    let body = body.replace(',', "");
    match body.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n * scale),
        _ => Err(CellError::Value),
    }
}

/// T(value) - the value if it is text, otherwise empty text
pub fn fn_t(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0).scalar() {
        FormulaValue::String(s) => FormulaValue::String(s),
        FormulaValue::Error(e) => FormulaValue::Error(e),
        _ => FormulaValue::String(String::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{eval, num, s};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slicing() {
        assert_eq!(eval("=LEN(\"héllo\")"), num(5.0));
        assert_eq!(eval("=LEFT(\"héllo\",2)"), s("hé"));
        assert_eq!(eval("=LEFT(\"abc\")"), s("a"));
        assert_eq!(eval("=RIGHT(\"abc\",5)"), s("abc"));
        assert_eq!(eval("=MID(\"abcdef\",3,2)"), s("cd"));
        assert_eq!(eval("=MID(\"abc\",10,2)"), s(""));
        assert_eq!(eval("=MID(\"abc\",0,2)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=LEFT(\"abc\",-1)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=LEN(12.5)"), num(4.0));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval("=UPPER(\"abc\")"), s("ABC"));
        assert_eq!(eval("=LOWER(\"ABC\")"), s("abc"));
        assert_eq!(eval("=TRIM(\"  a   b  \")"), s("a b"));
        assert_eq!(eval("=EXACT(\"a\",\"A\")"), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(eval("=CONCATENATE(\"a\",1,TRUE)"), s("a1TRUE"));
        assert_eq!(eval("=CONCAT({\"a\",\"b\";\"c\",\"d\"})"), s("abcd"));
        assert_eq!(eval("=REPT(\"ab\",3)"), s("ababab"));
        assert_eq!(eval("=REPT(\"ab\",20000)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_find_and_search() {
        assert_eq!(eval("=FIND(\"b\",\"abcb\")"), num(2.0));
        assert_eq!(eval("=FIND(\"b\",\"abcb\",3)"), num(4.0));
        assert_eq!(eval("=FIND(\"B\",\"abc\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=FIND(\"\",\"abc\",2)"), num(2.0));
        assert_eq!(eval("=FIND(\"a\",\"abc\",5)"), FormulaValue::Error(CellError::Value));

        assert_eq!(eval("=SEARCH(\"B\",\"abc\")"), num(2.0));
        assert_eq!(eval("=SEARCH(\"b?d\",\"abcd\")"), num(2.0));
        assert_eq!(eval("=SEARCH(\"a*d\",\"xxabcd\")"), num(3.0));
        assert_eq!(eval("=SEARCH(\"~*\",\"a*b\")"), num(2.0));
        assert_eq!(eval("=SEARCH(\"(\",\"a(b\")"), num(2.0));
        assert_eq!(eval("=SEARCH(\"z\",\"abc\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_wildcard_regex_anchoring() {
        let re = wildcard_regex("ap*", true).unwrap();
        assert!(re.is_match("Apple"));
        assert!(!re.is_match("pineapple"));
    }

    #[test]
    fn test_substitute() {
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\")"), s("a+b+c"));
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\",2)"), s("a-b+c"));
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\",3)"), s("a-b-c"));
        assert_eq!(eval("=SUBSTITUTE(\"abc\",\"\",\"x\")"), s("abc"));
    }

    #[test]
    fn test_value_and_t() {
        assert_eq!(eval("=VALUE(\" 1,234.5 \")"), num(1234.5));
        assert_eq!(eval("=VALUE(\"50%\")"), num(0.5));
        assert_eq!(eval("=VALUE(\"abc\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=T(\"x\")"), s("x"));
        assert_eq!(eval("=T(1)"), s(""));
    }
}
