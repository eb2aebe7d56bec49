//! Math functions

use super::{arg, cell_result, collect_numbers, number, number_or, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use rand::Rng;
use sheetcalc_core::CellError;

/// SUM(number1, [number2], ...)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::Number(collect_numbers(args)?.iter().sum())))
}

/// PRODUCT(number1, [number2], ...)
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Ok(FormulaValue::Number(0.0));
        }
        Ok(FormulaValue::Number(numbers.iter().product()))
    })
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(number(arg(args, 0))?.abs().into()))
}

/// Apply `f` to the magnitude of `n` scaled to `digits` decimal places
fn round_with(n: f64, digits: f64, f: impl Fn(f64) -> f64) -> f64 {
    let digits = digits.trunc() as i32;
    let factor = 10_f64.powi(digits.abs());
    let magnitude = if digits >= 0 {
        f(n.abs() * factor) / factor
    } else {
        f(n.abs() / factor) * factor
    };
    n.signum() * magnitude
}

fn rounded(args: &[FormulaValue], f: impl Fn(f64) -> f64) -> CellResult<FormulaValue> {
    let n = number(arg(args, 0))?;
    let digits = number_or(args, 1, 0.0)?;
    if n == 0.0 {
        return Ok(FormulaValue::Number(0.0));
    }
    Ok(FormulaValue::Number(round_with(n, digits, f)))
}

/// ROUND(number, [num_digits]) - rounds half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| rounded(args, f64::round))
}

/// ROUNDUP(number, [num_digits]) - rounds away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    // Scaling leaves representation noise (0.1 * 100 = 10.000000000000002)
    cell_result(|| rounded(args, |x| (x - 1e-9).ceil().max(0.0)))
}

/// ROUNDDOWN(number, [num_digits]) - rounds toward zero
pub fn fn_rounddown(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| rounded(args, |x| (x + 1e-9).floor()))
}

/// INT(number) - rounds down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(number(arg(args, 0))?.floor().into()))
}

/// TRUNC(number, [num_digits])
pub fn fn_trunc(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| rounded(args, f64::trunc))
}

/// MOD(number, divisor) - result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let n = number(arg(args, 0))?;
        let d = number(arg(args, 1))?;
        if d == 0.0 {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(n - d * (n / d).floor()))
    })
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let base = number(arg(args, 0))?;
        let exponent = number(arg(args, 1))?;
        if base == 0.0 && exponent < 0.0 {
            return Err(CellError::Div0);
        }
        Ok(base.powf(exponent).into())
    })
}

/// SQRT(number)
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let n = number(arg(args, 0))?;
        if n < 0.0 {
            return Err(CellError::Num);
        }
        Ok(n.sqrt().into())
    })
}

/// EXP(number)
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(number(arg(args, 0))?.exp().into()))
}

fn positive(value: &FormulaValue) -> CellResult<f64> {
    let n = number(value)?;
    if n <= 0.0 {
        return Err(CellError::Num);
    }
    Ok(n)
}

/// LN(number)
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(positive(arg(args, 0))?.ln().into()))
}

/// LOG(number, [base]) - base defaults to 10
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let n = positive(arg(args, 0))?;
        let base = match args.get(1) {
            Some(b) => positive(b)?,
            None => 10.0,
        };
        if base == 1.0 {
            return Err(CellError::Div0);
        }
        Ok((n.ln() / base.ln()).into())
    })
}

/// LOG10(number)
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(positive(arg(args, 0))?.log10().into()))
}

/// PI()
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// SIGN(number)
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let n = number(arg(args, 0))?;
        let sign = if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        };
        Ok(sign.into())
    })
}

/// RAND() - uniform in [0, 1); volatile
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - random integer, both ends inclusive; volatile
pub fn fn_randbetween(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let bottom = number(arg(args, 0))?.ceil() as i64;
        let top = number(arg(args, 1))?.floor() as i64;
        if bottom > top {
            return Err(CellError::Num);
        }
        let mut rng = rand::thread_rng();
        Ok(FormulaValue::Number(rng.gen_range(bottom..=top) as f64))
    })
}

/// SUMPRODUCT(array1, [array2], ...)
///
/// Arrays must share dimensions. Non-numeric entries count as zero.
pub fn fn_sumproduct(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let dims = arg(args, 0).dimensions();
        let mut products: Option<Vec<f64>> = None;

        for value in args {
            if let FormulaValue::Error(e) = value {
                return Err(*e);
            }
            if value.dimensions() != dims {
                return Err(CellError::Value);
            }
            let factors = value
                .flatten()
                .map(|v| match v {
                    FormulaValue::Number(n) => Ok(*n),
                    FormulaValue::Error(e) => Err(*e),
                    _ => Ok(0.0),
                })
                .collect::<CellResult<Vec<f64>>>()?;

            products = Some(match products {
                None => factors,
                Some(acc) => acc.iter().zip(&factors).map(|(a, b)| a * b).collect(),
            });
        }

        Ok(FormulaValue::Number(products.unwrap_or_default().iter().sum()))
    })
}

const ROMAN_CHARS: [char; 7] = ['M', 'D', 'C', 'L', 'X', 'V', 'I'];
const ROMAN_VALUES: [u32; 7] = [1000, 500, 100, 50, 10, 5, 1];

/// Roman numeral for 1..=3999. `form` 0 is classic; 1 to 4 allow
/// progressively longer subtractive pairs (499 is CDXCIX at 0, ID at 4).
pub(crate) fn to_roman(mut value: u32, form: u32) -> String {
    let mut out = String::new();

    for i in 0..=3 {
        let mut index = i * 2;
        let digit = value / ROMAN_VALUES[index];

        if digit % 5 == 4 {
            let index2 = if digit == 4 { index - 1 } else { index - 2 };
            let mut steps = 0;
            while steps < form && index < 6 {
                steps += 1;
                if ROMAN_VALUES[index2] - ROMAN_VALUES[index + 1] <= value {
                    index += 1;
                } else {
                    steps = form;
                }
            }
            out.push(ROMAN_CHARS[index]);
            out.push(ROMAN_CHARS[index2]);
            value = value + ROMAN_VALUES[index] - ROMAN_VALUES[index2];
        } else {
            if digit > 4 {
                out.push(ROMAN_CHARS[index - 1]);
            }
            for _ in 0..digit % 5 {
                out.push(ROMAN_CHARS[index]);
            }
            value %= ROMAN_VALUES[index];
        }
    }

    out
}

/// ROMAN(number, [form])
///
/// `form` is 0 to 4, `TRUE` (classic) or `FALSE` (most simplified).
pub fn fn_roman(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let n = number(arg(args, 0))?.trunc();
        let form = match args.get(1) {
            None | Some(FormulaValue::Empty) => 0.0,
            Some(FormulaValue::Boolean(true)) => 0.0,
            Some(FormulaValue::Boolean(false)) => 4.0,
            Some(other) => number(other)?.trunc(),
        };
        if !(0.0..=4.0).contains(&form) {
            return Err(CellError::Value);
        }
        if !(1.0..=3999.0).contains(&n) {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::String(to_roman(n as u32, form as u32)))
    })
}
