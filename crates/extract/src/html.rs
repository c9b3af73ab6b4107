//! Tolerant scanning helpers for scraped pages.
//!
//! Conventions: case-insensitive tag detection, local scanning within the
//! first `<table>` block, tag stripping, entity and whitespace
//! normalization. Pages are messy; these helpers must survive attribute
//! noise, uppercase tags, and formatting markup inside cells.

/// The inner HTML of the first `<table>` element, if any.
pub(crate) fn first_table(html: &str) -> Option<&str> {
    let open = find_ci(html, "<table", 0)?;
    let body_start = open + html[open..].find('>')? + 1;
    let close = find_ci(html, "</table", body_start)?;
    Some(&html[body_start..close])
}

/// All `<tr>` rows of a table body, each as a list of cleaned cell strings.
/// Rows without any `<td>`/`<th>` cells are skipped.
pub(crate) fn rows(table: &str) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(tr_open) = find_tag(table, "tr", pos) {
        let content_start = match table[tr_open..].find('>') {
            Some(i) => tr_open + i + 1,
            None => break,
        };
        let tr_close = find_ci(table, "</tr", content_start).unwrap_or(table.len());
        let cells = cells(&table[content_start..tr_close]);
        if !cells.is_empty() {
            out.push(cells);
        }
        pos = tr_close.max(content_start) + 1;
        if pos >= table.len() {
            break;
        }
    }

    out
}

fn cells(row: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(cell_open) = next_cell(row, pos) {
        let content_start = match row[cell_open..].find('>') {
            Some(i) => cell_open + i + 1,
            None => break,
        };
        let end_close = find_ci(row, "</td", content_start)
            .into_iter()
            .chain(find_ci(row, "</th", content_start))
            .min();
        let next_open = next_cell(row, content_start);
        let content_end = match (end_close, next_open) {
            (Some(c), Some(n)) => c.min(n),
            (Some(c), None) => c,
            (None, Some(n)) => n,
            (None, None) => row.len(),
        };
        out.push(clean_cell(&row[content_start..content_end]));
        // content_end is either a close tag or the next cell's open.
        pos = content_end;
        if pos >= row.len() {
            break;
        }
    }

    out
}

fn next_cell(row: &str, from: usize) -> Option<usize> {
    let td = find_tag(row, "td", from);
    let th = find_tag(row, "th", from);
    match (td, th) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Find `<name` where the tag name is followed by `>` or whitespace, so
/// `<td` never matches inside `<tdata>`-like markup.
fn find_tag(haystack: &str, name: &str, mut from: usize) -> Option<usize> {
    let open = format!("<{name}");
    loop {
        let at = find_ci(haystack, &open, from)?;
        match haystack.as_bytes().get(at + open.len()) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => return Some(at),
            None => return None,
            _ => from = at + 1,
        }
    }
}

fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || from + n.len() > h.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

fn clean_cell(raw: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(raw)))
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                // Tag boundaries separate words ("<br>" between lines).
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = match tail.find(';') {
            // Entities are short; a distant semicolon means a bare ampersand.
            Some(i) if i <= 8 => i,
            _ => {
                out.push('&');
                rest = &tail[1..];
                continue;
            }
        };
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "nbsp" => out.push(' '),
            _ => {
                let decoded = entity
                    .strip_prefix('#')
                    .and_then(|n| {
                        if let Some(hex) = n.strip_prefix('x').or_else(|| n.strip_prefix('X')) {
                            u32::from_str_radix(hex, 16).ok()
                        } else {
                            n.parse::<u32>().ok()
                        }
                    })
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..semi + 1]),
                }
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div>Gas prices</div>
<TABLE class="sortable">
  <tr><TH>State</TH><th>Regular</th><th>Diesel</th></tr>
  <tr><td><a href="/ca">California</a></td><td>$4.85</td><td>$5.10</td></tr>
  <tr>
    <td> Texas &amp; friends </td>
    <td>$2.99</td>
    <td>&#36;3.25</td>
  </tr>
</TABLE>
<table><tr><td>second table</td></tr></table>
</body></html>
"#;

    #[test]
    fn finds_first_table_only() {
        let table = first_table(PAGE).unwrap();
        assert!(table.contains("California"));
        assert!(!table.contains("second table"));
    }

    #[test]
    fn rows_strip_markup_and_entities() {
        let table = first_table(PAGE).unwrap();
        let rows = rows(table);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["State", "Regular", "Diesel"]);
        assert_eq!(rows[1], vec!["California", "$4.85", "$5.10"]);
        assert_eq!(rows[2], vec!["Texas & friends", "$2.99", "$3.25"]);
    }

    #[test]
    fn no_table_is_none() {
        assert!(first_table("<html><p>nothing here</p></html>").is_none());
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("AT&T stays"), "AT&T stays");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(clean_cell("  New\n   York  "), "New York");
    }
}
