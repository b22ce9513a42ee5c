//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// First `max_chars` characters of `s`. Counts chars, not bytes.
pub fn take_chars(s: &str, max_chars: usize) -> String {
  s.chars().take(max_chars).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} bytes total)", take_chars(s, max), s.len())
  }
}

/// Outermost `{ ... }` span of a model reply, for replies that wrap the JSON
/// object in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let end = text.rfind('}')?;
  if end <= start {
    return None;
  }
  Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{a} and {a} but not {b}", &[("a", "x")]);
    assert_eq!(out, "x and x but not {b}");
  }

  #[test]
  fn extract_json_object_strips_fences() {
    let reply = "```json\n{\"question\": \"Hi {there}\"}\n```";
    assert_eq!(extract_json_object(reply), Some("{\"question\": \"Hi {there}\"}"));
    assert_eq!(extract_json_object("no json here"), None);
    assert_eq!(extract_json_object("} backwards {"), None);
  }

  #[test]
  fn truncation_is_char_safe() {
    let s = "ééééé";
    assert_eq!(take_chars(s, 2), "éé");
    assert!(trunc_for_log(s, 2).starts_with("éé…"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
