//! Numeric builtins.
//!
//! Operands are strings parsed on demand; decimal, float, and `0x` hex
//! forms compare by value. Comparing non-numeric strings here is an error
//! (use `==s` and friends for text).

use std::sync::Arc;

use crate::exception::{EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::value::{fmt_num, Value};

use super::out_send;

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("+", add).variadic(0)));
    out.push(Arc::new(Builtin::new("-", sub).variadic(1)));
    out.push(Arc::new(Builtin::new("*", mul).variadic(0)));
    out.push(Arc::new(Builtin::new("/", div).variadic(1)));
    out.push(Arc::new(Builtin::new("^", pow).variadic(2)));
    out.push(Arc::new(Builtin::new("%", rem).arity(2, 2)));
    out.push(Arc::new(Builtin::new("==", num_eq).variadic(2)));
    out.push(Arc::new(Builtin::new("<", num_lt).variadic(2)));
    out.push(Arc::new(Builtin::new("<=", num_le).variadic(2)));
    out.push(Arc::new(Builtin::new(">", num_gt).variadic(2)));
    out.push(Arc::new(Builtin::new(">=", num_ge).variadic(2)));
    out.push(Arc::new(Builtin::new("ord", ord).arity(1, 1)));
    out.push(Arc::new(Builtin::new("base", base).variadic(2)));
    out.push(Arc::new(Builtin::new("wcswidth", wcswidth).arity(1, 1)));
}

fn nums(args: &Args) -> EvalResult<Vec<f64>> {
    let mut out = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        out.push(args.num_at(i)?);
    }
    Ok(out)
}

fn add(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let sum: f64 = nums(&args)?.into_iter().sum();
    out_send(ec, Value::str(fmt_num(sum)))
}

fn sub(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ns = nums(&args)?;
    let result = if ns.len() == 1 {
        -ns[0]
    } else {
        ns[1..].iter().fold(ns[0], |acc, n| acc - n)
    };
    out_send(ec, Value::str(fmt_num(result)))
}

fn mul(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let product: f64 = nums(&args)?.into_iter().product();
    out_send(ec, Value::str(fmt_num(product)))
}

/// Division is IEEE: `/ 1 0` is `+Inf`.
fn div(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ns = nums(&args)?;
    let result = ns[1..].iter().fold(ns[0], |acc, n| acc / n);
    out_send(ec, Value::str(fmt_num(result)))
}

fn pow(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ns = nums(&args)?;
    let result = ns[1..].iter().fold(ns[0], |acc, n| acc.powf(*n));
    out_send(ec, Value::str(fmt_num(result)))
}

fn rem(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let a = args.int_at(0)?;
    let b = args.int_at(1)?;
    let result = a
        .checked_rem(b)
        .ok_or_else(|| Exception::arg_kind("division by zero"))?;
    out_send(ec, Value::str(result.to_string()))
}

fn num_eq(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ns = nums(&args)?;
    out_send(ec, Value::Bool(ns.windows(2).all(|w| w[0] == w[1])))
}

fn chain(ec: &mut EvalCtx, args: Args, ok: fn(f64, f64) -> bool) -> EvalResult {
    let ns = nums(&args)?;
    out_send(ec, Value::Bool(ns.windows(2).all(|w| ok(w[0], w[1]))))
}

fn num_lt(ec: &mut EvalCtx, args: Args) -> EvalResult {
    chain(ec, args, |a, b| a < b)
}

fn num_le(ec: &mut EvalCtx, args: Args) -> EvalResult {
    chain(ec, args, |a, b| a <= b)
}

fn num_gt(ec: &mut EvalCtx, args: Args) -> EvalResult {
    chain(ec, args, |a, b| a > b)
}

fn num_ge(ec: &mut EvalCtx, args: Args) -> EvalResult {
    chain(ec, args, |a, b| a >= b)
}

/// Emit each character's code point in hex.
fn ord(ec: &mut EvalCtx, args: Args) -> EvalResult {
    for c in args.str_at(0)?.chars() {
        out_send(ec, Value::str(format!("{:#x}", c as u32)))?;
    }
    Ok(())
}

/// `base RADIX N…` — each integer formatted in the given radix.
fn base(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let radix = args.int_at(0)?;
    if !(2..=36).contains(&radix) {
        return Err(Exception::arg_kind(format!("bad radix: {}", radix)));
    }
    for i in 1..args.len() {
        let n = args.int_at(i)?;
        out_send(ec, Value::str(format_radix(n, radix as u32)))?;
    }
    Ok(())
}

fn format_radix(n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let negative = n < 0;
    let mut n = n.unsigned_abs();
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % radix as u64) as usize]);
        n /= radix as u64;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).expect("radix digits are ascii")
}

/// Terminal display width of a string.
fn wcswidth(ec: &mut EvalCtx, args: Args) -> EvalResult {
    use unicode_width::UnicodeWidthStr;
    let width = UnicodeWidthStr::width(args.str_at(0)?);
    out_send(ec, Value::str(width.to_string()))
}

#[cfg(test)]
mod tests {
    use super::format_radix;

    #[test]
    fn radix_formatting() {
        assert_eq!(format_radix(42, 16), "2a");
        assert_eq!(format_radix(233, 16), "e9");
        assert_eq!(format_radix(0, 2), "0");
        assert_eq!(format_radix(-255, 16), "-ff");
    }
}
