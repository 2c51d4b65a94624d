//! `RegExp` objects and the string methods that accept them.
//!
//! Patterns compile through `fancy-regex`, which covers the lookaround and
//! backreference syntax generated code tends to use. The `i`, `m` and `s`
//! flags become inline flags; `g` and `y` drive `lastIndex`; `u` and `d`
//! are accepted and ignored. Indices script code sees are char indices,
//! matching how strings are measured everywhere else.

use std::rc::Rc;

use fancy_regex::{Captures, Regex};

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::value::*;

pub(crate) const SOURCE_SLOT: &str = "[[OriginalSource]]";
pub(crate) const FLAGS_SLOT: &str = "[[OriginalFlags]]";
pub(crate) const LAST_INDEX_SLOT: &str = "[[LastIndex]]";

pub(crate) const REGEXP_METHODS: &[&str] = &["exec", "test", "toString"];

/// String methods that take a `RegExp` in place of a search string.
pub(crate) const PATTERN_METHODS: &[&str] = &["match", "matchAll", "replace", "replaceAll", "search", "split"];

/// A fresh `RegExp` object. The pattern compiles up front so a malformed
/// literal fails where it is evaluated.
pub(crate) fn new_regexp(ev: &mut Evaluator, source: &str, flags: &str) -> EvalResult<Value> {
    let mut seen = String::new();
    for flag in flags.chars() {
        if !"dgimsuy".contains(flag) || seen.contains(flag) {
            return Err(EvalError::syntax_error(format!(
                "Invalid flags supplied to RegExp constructor '{flags}'"
            )));
        }
        seen.push(flag);
    }
    ev.compiled_regex(source, flags)?;
    let mut props = PropertyMap::new();
    props.insert(SOURCE_SLOT.into(), Value::string(source));
    props.insert(FLAGS_SLOT.into(), Value::string(flags));
    props.insert(LAST_INDEX_SLOT.into(), Value::Number(0.0));
    Ok(Value::object_of(ObjectClass::RegExp, props))
}

/// `RegExp(pattern, flags)`; also callable with `new`.
pub(crate) fn regexp_constructor() -> Value {
    Value::constructor("RegExp", |ev, _, args| {
        let flags = match args.get(1) {
            None | Some(Value::Undefined) => None,
            Some(flags) => Some(ev.display(flags)?),
        };
        match args.first() {
            Some(Value::Object(obj)) if obj.class() == ObjectClass::RegExp => {
                let (source, own_flags) = source_and_flags(obj);
                new_regexp(ev, &source, &flags.unwrap_or(own_flags))
            }
            None | Some(Value::Undefined) => new_regexp(ev, "(?:)", &flags.unwrap_or_default()),
            Some(pattern) => {
                let source = ev.display(pattern)?;
                new_regexp(ev, &source, &flags.unwrap_or_default())
            }
        }
    })
}

/// `/source/flags`
pub(crate) fn regexp_text(obj: &ObjectRef) -> String {
    let (source, flags) = source_and_flags(obj);
    format!("/{source}/{flags}")
}

pub(crate) fn source_and_flags(obj: &ObjectRef) -> (String, String) {
    let slot = |key| obj.get(key).map(|v| v.to_display()).unwrap_or_default();
    (slot(SOURCE_SLOT), slot(FLAGS_SLOT))
}

pub(crate) fn as_regexp(value: &Value) -> Option<&ObjectRef> {
    match value {
        Value::Object(obj) if obj.class() == ObjectClass::RegExp => Some(obj),
        _ => None,
    }
}

/// Built-in properties of a `RegExp`.
pub(crate) fn regexp_property(obj: &ObjectRef, key: &str) -> Option<Value> {
    let (source, flags) = source_and_flags(obj);
    Some(match key {
        "source" => Value::string(source),
        "flags" => Value::string(flags),
        "global" => Value::Bool(flags.contains('g')),
        "ignoreCase" => Value::Bool(flags.contains('i')),
        "multiline" => Value::Bool(flags.contains('m')),
        "sticky" => Value::Bool(flags.contains('y')),
        "lastIndex" => obj.get(LAST_INDEX_SLOT).unwrap_or(Value::Number(0.0)),
        _ => return None,
    })
}

pub(crate) fn regexp_method(ev: &mut Evaluator, obj: &ObjectRef, name: &str, args: &[Value]) -> EvalResult<Value> {
    match name {
        "toString" => Ok(Value::string(regexp_text(obj))),
        _ => {
            let text = match args.first() {
                Some(value) => ev.display(value)?,
                None => "undefined".to_string(),
            };
            let found = exec(ev, obj, &text)?;
            Ok(if name == "test" { Value::Bool(!matches!(found, Value::Null)) } else { found })
        }
    }
}

impl Evaluator {
    /// Compile `source` under script `flags`, memoized per realm.
    pub(crate) fn compiled_regex(&mut self, source: &str, flags: &str) -> EvalResult<Rc<Regex>> {
        let key = format!("/{source}/{flags}");
        if let Some(re) = self.regex_cache.get(&key) {
            return Ok(Rc::clone(re));
        }
        let inline: String = flags.chars().filter(|f| "ims".contains(*f)).collect();
        let translated = translate(source);
        let pattern = if inline.is_empty() {
            translated
        } else {
            format!("(?{inline}){translated}")
        };
        let re = Regex::new(&pattern).map_err(|e| {
            EvalError::syntax_error(format!("Invalid regular expression: /{source}/{flags}: {e}"))
        })?;
        let re = Rc::new(re);
        self.regex_cache.insert(key, Rc::clone(&re));
        Ok(re)
    }

    fn regex_of(&mut self, obj: &ObjectRef, text: &str) -> EvalResult<(Rc<Regex>, String)> {
        let (source, flags) = source_and_flags(obj);
        let re = self.compiled_regex(&source, &flags)?;
        self.charge(text.len() as u64 / 64)?;
        Ok((re, flags))
    }
}

/// Rewrite the script-only spellings `\/` and `[^]` for the Rust engine.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('/') => out.push('/'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '[' if chars.as_str().starts_with("^]") => {
                chars.nth(1);
                out.push_str("[\\s\\S]");
            }
            other => out.push(other),
        }
    }
    out
}

fn match_failed(e: fancy_regex::Error) -> EvalError {
    EvalError::range_error(format!("Regular expression failed: {e}"))
}

fn captures_at<'t>(re: &Regex, text: &'t str, from: usize) -> EvalResult<Option<Captures<'t>>> {
    re.captures_from_pos(text, from).map_err(match_failed)
}

/// Byte offset of char index `chars`, or `None` past the end.
fn byte_offset(text: &str, chars: usize) -> Option<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .nth(chars)
}

fn char_count(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn next_boundary(text: &str, byte: usize) -> usize {
    text[byte..].chars().next().map_or(byte + 1, |c| byte + c.len_utf8())
}

fn group_value(caps: &Captures<'_>, i: usize) -> Value {
    caps.get(i).map_or(Value::Undefined, |m| Value::string(m.as_str()))
}

/// `[match, ...groups]`
fn match_array(caps: &Captures<'_>) -> Value {
    Value::array((0..caps.len()).map(|i| group_value(caps, i)).collect())
}

fn set_last_index(obj: &ObjectRef, index: usize) {
    obj.set(LAST_INDEX_SLOT, Value::Number(index as f64));
}

/// `regexp.exec(text)`: global and sticky patterns resume at `lastIndex`.
pub(crate) fn exec(ev: &mut Evaluator, obj: &ObjectRef, text: &str) -> EvalResult<Value> {
    let (re, flags) = ev.regex_of(obj, text)?;
    let resumes = flags.contains('g') || flags.contains('y');
    let start = if resumes {
        let last = obj.get(LAST_INDEX_SLOT).map_or(0.0, |v| v.to_number());
        if last.is_nan() { 0 } else { last.max(0.0) as usize }
    } else {
        0
    };
    let Some(from) = byte_offset(text, start) else {
        set_last_index(obj, 0);
        return Ok(Value::Null);
    };
    let caps = captures_at(&re, text, from)?;
    let caps = match caps {
        Some(caps) if !flags.contains('y') || caps.get(0).is_some_and(|m| m.start() == from) => caps,
        _ => {
            if resumes {
                set_last_index(obj, 0);
            }
            return Ok(Value::Null);
        }
    };
    if let (true, Some(whole)) = (resumes, caps.get(0)) {
        set_last_index(obj, char_count(text, whole.end()));
    }
    Ok(match_array(&caps))
}

/// Every match of `re` in `text`, stepping past empty matches.
fn all_matches<'t>(re: &Regex, text: &'t str) -> EvalResult<Vec<Captures<'t>>> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos <= text.len() {
        let Some(caps) = captures_at(re, text, pos)? else { break };
        let Some(whole) = caps.get(0) else { break };
        pos = if whole.end() == whole.start() {
            next_boundary(text, whole.end())
        } else {
            whole.end()
        };
        found.push(caps);
    }
    Ok(found)
}

/// `text.match(regexp)`
pub(crate) fn string_match(ev: &mut Evaluator, text: &str, obj: &ObjectRef) -> EvalResult<Value> {
    let (re, flags) = ev.regex_of(obj, text)?;
    if !flags.contains('g') {
        return exec(ev, obj, text);
    }
    set_last_index(obj, 0);
    let found = all_matches(&re, text)?;
    ev.charge(found.len() as u64)?;
    if found.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::array(found.iter().map(|caps| group_value(caps, 0)).collect()))
}

/// `text.matchAll(regexp)`, collected into an array of match arrays.
pub(crate) fn string_match_all(ev: &mut Evaluator, text: &str, obj: &ObjectRef) -> EvalResult<Value> {
    let (re, flags) = ev.regex_of(obj, text)?;
    if !flags.contains('g') {
        return Err(EvalError::type_error(
            "String.prototype.matchAll called with a non-global RegExp argument",
        ));
    }
    let found = all_matches(&re, text)?;
    ev.charge(found.len() as u64)?;
    Ok(Value::array(found.iter().map(match_array).collect()))
}

/// `text.search(regexp)`: char index of the first match, or `-1`.
pub(crate) fn string_search(ev: &mut Evaluator, text: &str, obj: &ObjectRef) -> EvalResult<Value> {
    let (re, _) = ev.regex_of(obj, text)?;
    let found = re.find(text).map_err(match_failed)?;
    Ok(Value::Number(found.map_or(-1.0, |m| char_count(text, m.start()) as f64)))
}

/// `text.split(regexp, limit)`; capture groups are spliced into the result.
pub(crate) fn string_split(ev: &mut Evaluator, text: &str, obj: &ObjectRef, limit: Option<usize>) -> EvalResult<Value> {
    let (re, _) = ev.regex_of(obj, text)?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut parts = Vec::new();
    if limit == 0 {
        return Ok(Value::array(parts));
    }
    if text.is_empty() {
        if captures_at(&re, text, 0)?.is_none() {
            parts.push(Value::string(text));
        }
        return Ok(Value::array(parts));
    }
    let mut last = 0;
    let mut pos = 0;
    while pos < text.len() {
        let Some(caps) = captures_at(&re, text, pos)? else { break };
        let Some(whole) = caps.get(0) else { break };
        // An empty match at the previous cut (or the end) splits nothing.
        if whole.end() == last || whole.start() >= text.len() {
            pos = next_boundary(text, whole.start().max(pos));
            continue;
        }
        parts.push(Value::string(&text[last..whole.start()]));
        if parts.len() >= limit {
            return Ok(Value::array(parts));
        }
        for i in 1..caps.len() {
            parts.push(group_value(&caps, i));
            if parts.len() >= limit {
                return Ok(Value::array(parts));
            }
        }
        ev.charge(caps.len() as u64)?;
        last = whole.end();
        pos = if whole.end() == whole.start() {
            next_boundary(text, whole.end())
        } else {
            whole.end()
        };
    }
    parts.push(Value::string(&text[last..]));
    Ok(Value::array(parts))
}

/// `text.replace(regexp, replacement)` and `replaceAll`.
pub(crate) fn string_replace(
    ev: &mut Evaluator,
    text: &str,
    obj: &ObjectRef,
    replacement: &Value,
    all: bool,
) -> EvalResult<Value> {
    let (re, flags) = ev.regex_of(obj, text)?;
    let global = flags.contains('g');
    if all && !global {
        return Err(EvalError::type_error(
            "replaceAll must be called with a global RegExp",
        ));
    }
    let found = if global {
        set_last_index(obj, 0);
        all_matches(&re, text)?
    } else {
        captures_at(&re, text, 0)?.into_iter().collect()
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in &found {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let with = match replacement {
            Value::Function(_) => {
                let mut args: Vec<Value> = (0..caps.len()).map(|i| group_value(caps, i)).collect();
                args.push(Value::Number(char_count(text, whole.start()) as f64));
                args.push(Value::string(text));
                let value = ev.call(replacement, Value::Undefined, args)?;
                ev.display(&value)?
            }
            other => expand_replacement(&ev.display(other)?, caps, text),
        };
        out.push_str(&with);
        if out.len() > MAX_STRING_LENGTH {
            return Err(EvalError::range_error("Invalid string length"));
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    ev.charge(out.len() as u64 / 64)?;
    Ok(Value::string(out))
}

/// Expand `$$`, `$&`, `` $` ``, `$'`, `$n` and `$<name>` in a replacement.
fn expand_replacement(template: &str, caps: &Captures<'_>, text: &str) -> String {
    let Some(whole) = caps.get(0) else {
        return template.to_string();
    };
    let group = |n: usize| (n >= 1 && n < caps.len()).then_some(n);
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().map(|&(_, next)| next) {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(whole.as_str());
            }
            Some('`') => {
                chars.next();
                out.push_str(&text[..whole.start()]);
            }
            Some('\'') => {
                chars.next();
                out.push_str(&text[whole.end()..]);
            }
            Some(d) if d.is_ascii_digit() => {
                let rest = &template[i + 1..];
                let digits = |width: usize| rest.get(..width).and_then(|t| t.parse::<usize>().ok()).and_then(group);
                match digits(2).map(|n| (n, 2)).or_else(|| digits(1).map(|n| (n, 1))) {
                    Some((n, width)) => {
                        for _ in 0..width {
                            chars.next();
                        }
                        out.push_str(caps.get(n).map_or("", |m| m.as_str()));
                    }
                    None => out.push('$'),
                }
            }
            Some('<') => match template[i + 2..].find('>') {
                Some(end) => {
                    let name = &template[i + 2..i + 2 + end];
                    out.push_str(caps.name(name).map_or("", |m| m.as_str()));
                    for (_, skipped) in chars.by_ref() {
                        if skipped == '>' {
                            break;
                        }
                    }
                }
                None => out.push('$'),
            },
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalOptions;

    fn regexp(ev: &mut Evaluator, source: &str, flags: &str) -> ObjectRef {
        match new_regexp(ev, source, flags).unwrap() {
            Value::Object(obj) => obj,
            other => panic!("expected a RegExp, got {other:?}"),
        }
    }

    #[test]
    fn test_flags_and_text() {
        let mut ev = Evaluator::new(EvalOptions::default());
        let re = regexp(&mut ev, "a+b", "gi");
        assert_eq!(regexp_text(&re), "/a+b/gi");
        assert!(regexp_method(&mut ev, &re, "test", &[Value::string("xAAB")]).unwrap().is_truthy());
        assert!(new_regexp(&mut ev, "a", "gg").is_err());
        assert!(new_regexp(&mut ev, "(", "").is_err());
    }

    #[test]
    fn test_translate_script_spellings() {
        assert_eq!(translate(r"a\/b"), "a/b");
        assert_eq!(translate(r"[^]+\d"), r"[\s\S]+\d");
    }

    #[test]
    fn test_global_exec_advances_last_index() {
        let mut ev = Evaluator::new(EvalOptions::default());
        let re = regexp(&mut ev, r"\d", "g");
        let first = exec(&mut ev, &re, "a1b2").unwrap();
        assert_eq!(first.to_display(), "1");
        assert_eq!(regexp_property(&re, "lastIndex").unwrap().to_number(), 2.0);
        assert_eq!(exec(&mut ev, &re, "a1b2").unwrap().to_display(), "2");
        assert!(matches!(exec(&mut ev, &re, "a1b2").unwrap(), Value::Null));
        assert_eq!(regexp_property(&re, "lastIndex").unwrap().to_number(), 0.0);
    }

    #[test]
    fn test_replacement_patterns() {
        let mut ev = Evaluator::new(EvalOptions::default());
        let re = regexp(&mut ev, r"(?<first>\w+) (\w+)", "");
        let out = string_replace(&mut ev, "hello world", &re, &Value::string("$2 $<first> [$&] $$"), false).unwrap();
        assert_eq!(out.to_display(), "world hello [hello world] $");
    }

    #[test]
    fn test_split_with_captures_and_empty_matches() {
        let mut ev = Evaluator::new(EvalOptions::default());
        let re = regexp(&mut ev, r"(-)", "");
        assert_eq!(string_split(&mut ev, "a-b", &re, None).unwrap().to_display(), "a,-,b");
        let empty = regexp(&mut ev, "", "");
        assert_eq!(string_split(&mut ev, "abc", &empty, None).unwrap().to_display(), "a,b,c");
        assert_eq!(string_split(&mut ev, "abc", &empty, Some(2)).unwrap().to_display(), "a,b");
    }
}
