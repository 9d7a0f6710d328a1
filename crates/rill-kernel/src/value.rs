//! The rill value model.
//!
//! Values are immutable from the script's point of view. Containers are
//! persistent (`im`) structures behind `Arc`, so `assoc`/`dissoc` and
//! indexed assignment are cheap functional updates while `is` retains a
//! meaningful notion of identity.
//!
//! Strings carry no implicit numeric type; numeric builtins parse on
//! demand (decimal integer, float, or `0x`-prefixed hex).

use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::{PipeReader, PipeWriter};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::Fun;

/// A script value.
#[derive(Clone)]
pub enum Value {
    Str(String),
    Bool(bool),
    List(Arc<im::Vector<Value>>),
    Map(Arc<im::HashMap<Value, Value>>),
    Fn(Arc<dyn Fun>),
    File(Arc<FileValue>),
    Pipe(Arc<PipeValue>),
    Error(Arc<Exception>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(items.into_iter().collect()))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Arc::new(entries.into_iter().collect()))
    }

    pub fn fun(f: Arc<dyn Fun>) -> Self {
        Value::Fn(f)
    }

    pub fn file(f: FileValue) -> Self {
        Value::File(Arc::new(f))
    }

    pub fn pipe(p: PipeValue) -> Self {
        Value::Pipe(Arc::new(p))
    }

    pub fn error(e: Exception) -> Self {
        Value::Error(Arc::new(e))
    }

    /// The kind name reported by `kind-of`.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Fn(_) => "fn",
            Value::File(_) => "file",
            Value::Pipe(_) => "pipe",
            Value::Error(_) => "exception",
        }
    }

    /// Truthiness: everything is true except `$false`.
    pub fn as_bool(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Identity comparison (`is`).
    ///
    /// Scalars compare by content; containers, functions, and handles by
    /// pointer. Empty containers of the same kind are indistinguishable.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || (a.is_empty() && b.is_empty())
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(a, b) || (a.is_empty() && b.is_empty())
            }
            (Value::Fn(a), Value::Fn(b)) => Arc::ptr_eq(a, b),
            (Value::File(a), Value::File(b)) => Arc::ptr_eq(a, b),
            (Value::Pipe(a), Value::Pipe(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The textual form used by `print`/`echo` and external command args:
    /// strings raw, everything else as its repr.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// The canonical source-like representation.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => repr_str(s),
            Value::Bool(true) => "$true".to_string(),
            Value::Bool(false) => "$false".to_string(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(" "))
            }
            Value::Map(entries) => {
                if entries.is_empty() {
                    return "[&]".to_string();
                }
                let mut pairs: Vec<(String, String)> = entries
                    .iter()
                    .map(|(k, v)| (k.repr(), v.repr()))
                    .collect();
                pairs.sort();
                let inner: Vec<String> =
                    pairs.into_iter().map(|(k, v)| format!("&{}={}", k, v)).collect();
                format!("[{}]", inner.join(" "))
            }
            Value::Fn(f) => format!("<fn {}>", f.name()),
            Value::File(f) => format!("<file {}>", f.name),
            Value::Pipe(_) => "<pipe>".to_string(),
            Value::Error(e) => format!("<exception: {}>", e.cause),
        }
    }

    /// Multi-line representation used by `pprint`.
    pub fn pretty(&self, indent: usize) -> String {
        let pad = " ".repeat(indent + 1);
        let close_pad = " ".repeat(indent);
        match self {
            Value::List(items) if !items.is_empty() => {
                let mut out = String::from("[\n");
                for item in items.iter() {
                    out.push_str(&pad);
                    out.push_str(&item.pretty(indent + 1));
                    out.push('\n');
                }
                out.push_str(&close_pad);
                out.push(']');
                out
            }
            Value::Map(entries) if !entries.is_empty() => {
                let mut pairs: Vec<(String, Value)> = entries
                    .iter()
                    .map(|(k, v)| (k.repr(), v.clone()))
                    .collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                let mut out = String::from("[\n");
                for (key, val) in pairs {
                    out.push_str(&pad);
                    out.push('&');
                    out.push_str(&key);
                    out.push('=');
                    out.push_str(&val.pretty(indent + 1));
                    out.push('\n');
                }
                out.push_str(&close_pad);
                out.push(']');
                out
            }
            other => other.repr(),
        }
    }

    /// Index a list (integer or `i:j` slice, negatives from the end) or a
    /// map (structural key lookup).
    pub fn index(&self, idx: &Value) -> EvalResult<Value> {
        match self {
            Value::List(items) => {
                let text = match idx {
                    Value::Str(s) => s.as_str(),
                    other => {
                        return Err(Exception::arg_kind(format!(
                            "list index must be a string, got {}",
                            other.kind()
                        )))
                    }
                };
                index_list(items, text)
            }
            Value::Map(entries) => entries.get(idx).cloned().ok_or_else(|| {
                Exception::arg_kind(format!("no such key: {}", idx.repr()))
            }),
            other => Err(Exception::arg_kind(format!("cannot index a {}", other.kind()))),
        }
    }

    /// Functional insert/update (`assoc`, indexed assignment).
    pub fn assoc(&self, key: &Value, val: Value) -> EvalResult<Value> {
        match self {
            Value::List(items) => {
                let text = match key {
                    Value::Str(s) => s.as_str(),
                    other => {
                        return Err(Exception::arg_kind(format!(
                            "list index must be a string, got {}",
                            other.kind()
                        )))
                    }
                };
                let i = resolve_list_index(text, items.len())?;
                Ok(Value::List(Arc::new(items.update(i, val))))
            }
            Value::Map(entries) => Ok(Value::Map(Arc::new(entries.update(key.clone(), val)))),
            other => Err(Exception::arg_kind(format!("cannot assoc into a {}", other.kind()))),
        }
    }

    /// Functional delete (`dissoc`).
    pub fn dissoc(&self, key: &Value) -> EvalResult<Value> {
        match self {
            Value::Map(entries) => Ok(Value::Map(Arc::new(entries.without(key)))),
            other => Err(Exception::arg_kind(format!("cannot dissoc from a {}", other.kind()))),
        }
    }

    /// Convert to a JSON document (`to-json`).
    pub fn to_json(&self) -> EvalResult<serde_json::Value> {
        match self {
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::List(items) => {
                let mut arr = Vec::with_capacity(items.len());
                for item in items.iter() {
                    arr.push(item.to_json()?);
                }
                Ok(serde_json::Value::Array(arr))
            }
            Value::Map(entries) => {
                // serde_json's default map is ordered, so keys serialize sorted.
                let mut obj = serde_json::Map::new();
                for (k, v) in entries.iter() {
                    obj.insert(k.to_display(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(obj))
            }
            other => Err(Exception::arg_kind(format!(
                "a {} cannot be converted to JSON",
                other.kind()
            ))),
        }
    }

    /// Convert from a JSON document (`from-json`). Numbers become strings;
    /// null becomes the empty string.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::str(""),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::str(i.to_string())
                } else {
                    Value::str(fmt_num(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Value::str(s.clone()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json)),
            serde_json::Value::Object(obj) => Value::map(
                obj.iter().map(|(k, v)| (Value::str(k.clone()), Value::from_json(v))),
            ),
        }
    }
}

/// Structural equality (`eq`): deep for containers, pointer for functions
/// and handles.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => Arc::ptr_eq(a, b),
            (Value::File(a), Value::File(b)) => Arc::ptr_eq(a, b),
            (Value::Pipe(a), Value::Pipe(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Str(s) => {
                state.write_u8(0);
                s.hash(state);
            }
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::List(items) => {
                state.write_u8(2);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Map(entries) => {
                state.write_u8(3);
                // Order-independent: combine per-entry hashes commutatively.
                let mut acc: u64 = 0;
                for (k, v) in entries.iter() {
                    let mut h = std::collections::hash_map::DefaultHasher::new();
                    k.hash(&mut h);
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                state.write_u64(acc);
            }
            Value::Fn(f) => {
                state.write_u8(4);
                state.write_usize(Arc::as_ptr(f) as *const () as usize);
            }
            Value::File(f) => {
                state.write_u8(5);
                state.write_usize(Arc::as_ptr(f) as usize);
            }
            Value::Pipe(p) => {
                state.write_u8(6);
                state.write_usize(Arc::as_ptr(p) as usize);
            }
            Value::Error(e) => {
                state.write_u8(7);
                state.write_usize(Arc::as_ptr(e) as usize);
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

/// Quote a string for repr output when it contains non-bare characters.
fn repr_str(s: &str) -> String {
    let bare = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || "-_:%+,./@!~".contains(c)
        });
    if bare {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "''"))
    }
}

/// Resolve a plain (non-slice) list index, negatives counting from the end.
fn resolve_list_index(text: &str, len: usize) -> EvalResult<usize> {
    let i = parse_int(text)
        .ok_or_else(|| Exception::arg_kind(format!("bad list index: {}", text)))?;
    let i = if i < 0 { i + len as i64 } else { i };
    if i < 0 || i >= len as i64 {
        return Err(Exception::arg_kind(format!("index {} out of range", text)));
    }
    Ok(i as usize)
}

/// Index into a list with either a plain index or an `i:j` slice.
fn index_list(items: &im::Vector<Value>, text: &str) -> EvalResult<Value> {
    let len = items.len();
    if let Some((lo, hi)) = text.split_once(':') {
        let lo = if lo.is_empty() { 0 } else { slice_bound(lo, len)? };
        let hi = if hi.is_empty() { len as i64 } else { slice_bound(hi, len)? };
        if lo < 0 || hi < lo || hi > len as i64 {
            return Err(Exception::arg_kind(format!("slice {} out of range", text)));
        }
        let slice: im::Vector<Value> = items
            .iter()
            .skip(lo as usize)
            .take((hi - lo) as usize)
            .cloned()
            .collect();
        Ok(Value::List(Arc::new(slice)))
    } else {
        let i = resolve_list_index(text, len)?;
        Ok(items.get(i).cloned().expect("index checked in range"))
    }
}

fn slice_bound(text: &str, len: usize) -> EvalResult<i64> {
    let i = parse_int(text)
        .ok_or_else(|| Exception::arg_kind(format!("bad slice bound: {}", text)))?;
    Ok(if i < 0 { i + len as i64 } else { i })
}

/// Parse a string as a number: decimal integer, float, or `0x` hex.
pub fn parse_num(text: &str) -> Option<f64> {
    if let Some(i) = parse_hex(text) {
        return Some(i as f64);
    }
    text.parse::<f64>().ok().filter(|f| !f.is_nan())
}

/// Parse a string as an integer (decimal or `0x` hex).
pub fn parse_int(text: &str) -> Option<i64> {
    if let Some(i) = parse_hex(text) {
        return Some(i);
    }
    text.parse::<i64>().ok()
}

fn parse_hex(text: &str) -> Option<i64> {
    let (neg, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))?;
    let i = i64::from_str_radix(digits, 16).ok()?;
    Some(if neg { -i } else { i })
}

/// Format a number the way numeric builtins emit it: integral values
/// without a decimal point, infinities as `+Inf`/`-Inf`.
pub fn fmt_num(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
    } else if f == f.trunc() && f.abs() < 9.0e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Parse a value as a number or fail with `ArgKind`.
pub fn num_of(v: &Value) -> EvalResult<f64> {
    match v {
        Value::Str(s) => parse_num(s)
            .ok_or_else(|| Exception::arg_kind(format!("not a number: {}", s))),
        other => Err(Exception::arg_kind(format!("not a number: {}", other.repr()))),
    }
}

/// An open OS file with explicit lifecycle (`fopen`/`fclose`).
pub struct FileValue {
    pub name: String,
    inner: Mutex<Option<fs::File>>,
}

impl FileValue {
    pub fn new(name: impl Into<String>, file: fs::File) -> Self {
        Self { name: name.into(), inner: Mutex::new(Some(file)) }
    }

    /// Duplicate the underlying handle for use as a port or child stdio.
    pub fn clone_handle(&self) -> EvalResult<fs::File> {
        match self.inner.lock().as_ref() {
            Some(f) => f.try_clone().map_err(Exception::io),
            None => Err(Exception::new(Cause::Io(format!("file {} already closed", self.name)))),
        }
    }

    /// Close the file. Closing twice is an error at this layer.
    pub fn close(&self) -> EvalResult<()> {
        match self.inner.lock().take() {
            Some(_) => Ok(()),
            None => Err(Exception::new(Cause::Io(format!("file {} already closed", self.name)))),
        }
    }
}

impl fmt::Debug for FileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<file {}>", self.name)
    }
}

/// An OS pipe pair with independently closable ends (`pipe`, `prclose`,
/// `pwclose`).
pub struct PipeValue {
    reader: Mutex<Option<PipeReader>>,
    writer: Mutex<Option<PipeWriter>>,
}

impl PipeValue {
    pub fn new(reader: PipeReader, writer: PipeWriter) -> Self {
        Self { reader: Mutex::new(Some(reader)), writer: Mutex::new(Some(writer)) }
    }

    pub fn clone_reader(&self) -> EvalResult<PipeReader> {
        match self.reader.lock().as_ref() {
            Some(r) => r.try_clone().map_err(Exception::io),
            None => Err(Exception::new(Cause::Io("pipe read end already closed".into()))),
        }
    }

    pub fn clone_writer(&self) -> EvalResult<PipeWriter> {
        match self.writer.lock().as_ref() {
            Some(w) => w.try_clone().map_err(Exception::io),
            None => Err(Exception::new(Cause::Io("pipe write end already closed".into()))),
        }
    }

    pub fn close_reader(&self) -> EvalResult<()> {
        match self.reader.lock().take() {
            Some(_) => Ok(()),
            None => Err(Exception::new(Cause::Io("pipe read end already closed".into()))),
        }
    }

    pub fn close_writer(&self) -> EvalResult<()> {
        match self.writer.lock().take() {
            Some(_) => Ok(()),
            None => Err(Exception::new(Cause::Io("pipe write end already closed".into()))),
        }
    }
}

impl fmt::Debug for PipeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<pipe>")
    }
}
