//! NMR-STAR text reader.
//!
//! Handles the subset of STAR used by BMRB entries: one `data_` block holding
//! `save_` frames, `_Category.tag value` pairs, `loop_ ... stop_` tables, quoted
//! values, semicolon text fields and `#` comments.

use crate::error::NmrError;
use crate::record::{Loop, MemoryRecord, TagTable};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    quoted: bool,
    line: usize,
}

impl Token {
    fn is_keyword(&self) -> bool {
        if self.quoted {
            return false;
        }
        let lower = self.text.to_ascii_lowercase();
        lower.starts_with("data_")
            || lower.starts_with("save_")
            || lower == "loop_"
            || lower == "stop_"
            || lower == "global_"
    }

    fn is_tag(&self) -> bool {
        !self.quoted && self.text.starts_with('_')
    }

    fn is(&self, keyword: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(keyword)
    }
}

pub fn parse(origin: &str, text: &str) -> Result<MemoryRecord, NmrError> {
    let tokens = tokenize(text).map_err(|message| NmrError::malformed(origin, message))?;
    let parser = Parser {
        tokens,
        position: 0,
        record: MemoryRecord::new(origin),
        frame: None,
        saw_data_block: false,
    };
    parser
        .run()
        .map_err(|message| NmrError::malformed(origin, message))
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut lines = text.lines().enumerate();
    while let Some((index, line)) = lines.next() {
        let number = index + 1;
        if let Some(first) = line.strip_prefix(';') {
            let mut body = Vec::new();
            if !first.trim().is_empty() {
                body.push(first);
            }
            let mut closed = false;
            for (_, next) in lines.by_ref() {
                if next.starts_with(';') {
                    closed = true;
                    break;
                }
                body.push(next);
            }
            if !closed {
                return Err(format!("line {number}: unterminated text field"));
            }
            tokens.push(Token {
                text: body.join("\n"),
                quoted: true,
                line: number,
            });
            continue;
        }
        split_line(line, number, &mut tokens)?;
    }
    Ok(tokens)
}

fn split_line(line: &str, number: usize, tokens: &mut Vec<Token>) -> Result<(), String> {
    let chars: Vec<char> = line.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let current = chars[index];
        if current.is_whitespace() {
            index += 1;
            continue;
        }
        if current == '#' {
            break;
        }
        if current == '\'' || current == '"' {
            // A quote only closes when followed by whitespace or the end of the line.
            let mut end = index + 1;
            loop {
                if end >= chars.len() {
                    return Err(format!("line {number}: unterminated quoted value"));
                }
                if chars[end] == current && chars.get(end + 1).is_none_or(|next| next.is_whitespace()) {
                    break;
                }
                end += 1;
            }
            tokens.push(Token {
                text: chars[index + 1..end].iter().collect(),
                quoted: true,
                line: number,
            });
            index = end + 1;
            continue;
        }
        let start = index;
        while index < chars.len() && !chars[index].is_whitespace() {
            index += 1;
        }
        tokens.push(Token {
            text: chars[start..index].iter().collect(),
            quoted: false,
            line: number,
        });
    }
    Ok(())
}

/// `_Entry.Title` -> (`Entry`, `Title`).
fn split_tag(tag: &str) -> (String, String) {
    let tag = tag.trim_start_matches('_');
    match tag.split_once('.') {
        Some((category, name)) => (category.to_string(), name.to_string()),
        None => (String::new(), tag.to_string()),
    }
}

struct OpenFrame {
    name: String,
    line: usize,
    tags: Vec<(String, String, String)>,
}

impl OpenFrame {
    fn into_tag_table(self) -> TagTable {
        let prefix = self
            .tags
            .first()
            .map(|(category, _, _)| category.clone())
            .unwrap_or_else(|| self.name.clone());
        let category = self
            .tags
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case("Sf_category"))
            .map(|(_, _, value)| value.clone())
            .unwrap_or_else(|| prefix.to_ascii_lowercase());
        let mut frame = TagTable::new(&category, &prefix);
        for (_, name, value) in &self.tags {
            frame.push(name, value);
        }
        frame
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    record: MemoryRecord,
    frame: Option<OpenFrame>,
    saw_data_block: bool,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn run(mut self) -> Result<MemoryRecord, String> {
        while let Some(token) = self.tokens.get(self.position).cloned() {
            self.position += 1;
            let lower = token.text.to_ascii_lowercase();
            if token.quoted {
                return Err(format!("line {}: value without a tag", token.line));
            } else if lower.starts_with("data_") {
                self.saw_data_block = true;
            } else if lower.starts_with("save_") {
                self.saveframe_boundary(&token)?;
            } else if token.is("loop_") {
                self.read_loop(token.line)?;
            } else if token.is_tag() {
                self.read_tag(&token)?;
            } else if token.is("global_") || token.is("stop_") {
                return Err(format!("line {}: unexpected {}", token.line, token.text));
            } else {
                return Err(format!("line {}: value without a tag", token.line));
            }
        }
        if let Some(frame) = &self.frame {
            return Err(format!("line {}: saveframe {} is not closed", frame.line, frame.name));
        }
        if !self.saw_data_block {
            return Err("no data_ block".to_string());
        }
        Ok(self.record)
    }

    fn saveframe_boundary(&mut self, token: &Token) -> Result<(), String> {
        let name = &token.text[5..];
        if name.is_empty() {
            let frame = self
                .frame
                .take()
                .ok_or_else(|| format!("line {}: save_ without an open saveframe", token.line))?;
            self.record.push_saveframe(frame.into_tag_table());
            return Ok(());
        }
        if let Some(open) = &self.frame {
            return Err(format!(
                "line {}: saveframe {name} opened inside {}",
                token.line, open.name
            ));
        }
        self.frame = Some(OpenFrame {
            name: name.to_string(),
            line: token.line,
            tags: Vec::new(),
        });
        Ok(())
    }

    fn read_tag(&mut self, tag: &Token) -> Result<(), String> {
        let value = match self.peek() {
            Some(value) if !value.is_keyword() && !value.is_tag() => value.text.clone(),
            _ => return Err(format!("line {}: tag {} has no value", tag.line, tag.text)),
        };
        self.position += 1;
        let (category, name) = split_tag(&tag.text);
        match &mut self.frame {
            Some(frame) => frame.tags.push((category, name, value)),
            None => self
                .record
                .push_tag(tag.text.trim_start_matches('_'), &value),
        }
        Ok(())
    }

    fn read_loop(&mut self, line: usize) -> Result<(), String> {
        let mut columns = Vec::new();
        let mut category = None;
        while let Some(token) = self.peek().filter(|token| token.is_tag()) {
            let (tag_category, column) = split_tag(&token.text);
            category.get_or_insert(tag_category);
            columns.push(column);
            self.position += 1;
        }
        let Some(category) = category else {
            return Err(format!("line {line}: loop_ without column tags"));
        };

        let mut values = Vec::new();
        while let Some(token) = self.peek() {
            if token.is("stop_") {
                self.position += 1;
                break;
            }
            if token.is_keyword() || token.is_tag() {
                break;
            }
            values.push(token.text.clone());
            self.position += 1;
        }
        if values.len() % columns.len() != 0 {
            return Err(format!(
                "line {line}: loop {category} has {} values for {} columns",
                values.len(),
                columns.len()
            ));
        }

        let width = columns.len();
        let mut table = Loop::from_parts(category, columns);
        for row in values.chunks(width) {
            table.push_row(row.to_vec());
        }
        self.record.push_loop(table);
        Ok(())
    }
}
