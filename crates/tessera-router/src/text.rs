//! Name conversion and text helpers shared by routing and validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Converts `user_info`, `user-info` or `userInfo` into `UserInfo`.
///
/// # Example
///
/// ```rust
/// use tessera_router::text::studly;
///
/// assert_eq!(studly("user_info"), "UserInfo");
/// assert_eq!(studly("blog-post"), "BlogPost");
/// assert_eq!(studly("userInfo"), "UserInfo");
/// ```
#[must_use]
pub fn studly(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut upper_next = true;
    for c in value.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts `UserInfo` or `userInfo` into `user_info`.
///
/// Whitespace is dropped and every upper-case letter after the first
/// character starts a new word.
#[must_use]
pub fn snake(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (index, c) in value.chars().filter(|c| !c.is_whitespace()).enumerate() {
        if c.is_uppercase() {
            if index > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts `user_info` into `userInfo`.
#[must_use]
pub fn camel(value: &str) -> String {
    let studly = studly(value);
    let mut chars = studly.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

/// Removes HTML and XML tags, including comments.
///
/// Quoted attribute values may contain `>` without ending the tag.
#[must_use]
pub fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];

        if let Some(comment) = tag.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        let mut quote = None;
        let mut end = None;
        for (index, c) in tag.char_indices().skip(1) {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '>') => {
                    end = Some(index);
                    break;
                }
                (None, _) => {}
            }
        }
        rest = end.map_or("", |end| &tag[end + 1..]);
    }

    out.push_str(rest);
    out
}

/// Returns `true` if the value reads as a calendar date or timestamp.
///
/// Accepted: a bare four-digit year, `Y-m`, `Y-m-d`, `Y/m/d`, `Ymd`,
/// common date-time layouts, RFC 3339 and RFC 2822.
#[must_use]
pub fn is_date(value: &str) -> bool {
    const DATES: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
    const DATETIMES: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M:%S"];

    let value = value.trim();
    if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    if let Some((year, month)) = value.split_once('-') {
        if year.len() == 4 && !month.contains('-') {
            return NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok();
        }
    }

    DATES.iter().any(|f| NaiveDate::parse_from_str(value, f).is_ok())
        || DATETIMES
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_studly() {
        assert_eq!(studly("index"), "Index");
        assert_eq!(studly("user_info"), "UserInfo");
        assert_eq!(studly("USER"), "USER");
        assert_eq!(studly(""), "");
    }

    #[test]
    fn test_snake() {
        assert_eq!(snake("UserInfo"), "user_info");
        assert_eq!(snake("userInfo"), "user_info");
        assert_eq!(snake("show"), "show");
        assert_eq!(snake("getHTML"), "get_h_t_m_l");
        assert_eq!(snake("Already_Snake"), "already_snake");
    }

    #[test]
    fn test_camel() {
        assert_eq!(camel("user_info"), "userInfo");
        assert_eq!(camel("Show"), "show");
        assert_eq!(camel(""), "");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>bold</b> text"), "bold text");
        assert_eq!(strip_tags("a<!-- hidden -->b"), "ab");
        assert_eq!(strip_tags(r#"<a title="x>y">link</a>"#), "link");
        assert_eq!(strip_tags("no tags"), "no tags");
        assert_eq!(strip_tags("broken <tag"), "broken ");
    }

    #[test]
    fn test_is_date() {
        assert!(is_date("2024"));
        assert!(is_date("2024-03"));
        assert!(is_date("2024-03-15"));
        assert!(is_date("2024/03/15"));
        assert!(is_date("2024-03-15 10:30:00"));
        assert!(is_date("2024-03-15T10:30:00Z"));
        assert!(!is_date("2024-13"));
        assert!(!is_date("abc"));
    }

    proptest! {
        #[test]
        fn prop_snake_undoes_studly(s in "[a-z]{1,6}(_[a-z]{1,6}){0,3}") {
            prop_assert_eq!(snake(&studly(&s)), s);
        }

        #[test]
        fn prop_strip_tags_leaves_no_tags(s in "[a-z<>/ ]{0,24}") {
            prop_assert!(!strip_tags(&s).contains('<'));
        }
    }
}
