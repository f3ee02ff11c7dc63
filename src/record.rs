use indexmap::IndexMap;

/// Values that mean "nothing recorded" in every supported format.
pub const EMPTY_SENTINELS: [&str; 3] = [".", "?", "n/a"];

/// Loop categories a companion record may contribute rows to.
const SUPPLEMENT_LOOPS: [&str; 2] = ["Sample_component", "Sample_condition_variable"];

/// Saveframe categories a companion record may contribute tags to.
const SUPPLEMENT_FRAMES: [&str; 1] = ["NMR_spectrometer"];

/// Returns the trimmed value unless it is blank or an empty-marker.
pub fn present(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || EMPTY_SENTINELS
            .iter()
            .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
    {
        return None;
    }
    Some(trimmed)
}

/// Read-only view of one parsed input file.
pub trait RecordSource {
    /// Label used in logs, usually the file path.
    fn origin(&self) -> &str;

    /// Every value stored under a dotted `Category.tag` path. Empty when the tag is absent.
    fn get_tag(&self, path: &str) -> Vec<String>;

    /// Every loop table of a category, in file order.
    fn get_loops(&self, category: &str) -> Vec<Loop>;

    /// Tag tables of every saveframe of a category, in file order.
    fn get_saveframe_tags(&self, category: &str) -> Vec<TagTable>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    category: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Loop {
    pub fn new(category: &str, columns: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_parts(category: String, columns: Vec<String>) -> Self {
        Self {
            category,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, values: &[&str]) -> Self {
        self.push_row(values.iter().map(|value| value.to_string()).collect());
        self
    }

    /// Appends a row, padding short rows with `.` so every row spans all columns.
    pub fn push_row(&mut self, mut values: Vec<String>) {
        values.resize(self.columns.len(), ".".to_string());
        self.rows.push(values);
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows.len()).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    /// First present `column` value among rows whose `filter_column` equals
    /// `filter_value`, compared case-insensitively.
    pub fn find_value(&self, filter_column: &str, filter_value: &str, column: &str) -> Option<&str> {
        self.rows()
            .filter(|row| {
                row.get(filter_column)
                    .map(|value| value.eq_ignore_ascii_case(filter_value))
                    .unwrap_or(false)
            })
            .find_map(|row| row.get(column))
    }

    /// Partitions the rows by the value of `column`, keeping first-seen order.
    /// Rows without a value land under the empty key.
    pub fn split_by(&self, column: &str) -> Vec<(String, Loop)> {
        let mut parts: IndexMap<String, Loop> = IndexMap::new();
        for row in self.rows() {
            let key = row.get(column).unwrap_or_default().to_string();
            parts
                .entry(key)
                .or_insert_with(|| Loop::from_parts(self.category.clone(), self.columns.clone()))
                .rows
                .push(self.rows[row.index].clone());
        }
        parts.into_iter().collect()
    }

    /// Rows of `self` followed by rows of `other`, over the union of both column sets.
    pub fn merged(&self, other: &Loop) -> Loop {
        let mut columns = self.columns.clone();
        for column in &other.columns {
            if !columns.iter().any(|known| known.eq_ignore_ascii_case(column)) {
                columns.push(column.clone());
            }
        }
        let mut merged = Loop::from_parts(self.category.clone(), columns);
        for table in [self, other] {
            for row in table.rows() {
                let values = merged
                    .columns
                    .iter()
                    .map(|column| row.raw(column).unwrap_or(".").to_string())
                    .collect();
                merged.rows.push(values);
            }
        }
        merged
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Loop,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Present value of a column; blank and sentinel values read as `None`.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.raw(column).and_then(present)
    }

    pub fn raw(&self, column: &str) -> Option<&'a str> {
        let position = self.table.column(column)?;
        self.table.rows[self.index]
            .get(position)
            .map(|value| value.as_str())
    }
}

/// Tags of one saveframe, e.g. a `spectral_peak_list` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TagTable {
    category: String,
    prefix: String,
    tags: Vec<(String, String)>,
}

impl TagTable {
    /// `category` is the saveframe category, `prefix` the tag category (`Spectral_peak_list`).
    pub fn new(category: &str, prefix: &str) -> Self {
        Self {
            category: category.to_string(),
            prefix: prefix.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, name: &str, value: &str) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.tags.push((name.to_string(), value.to_string()));
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .filter(|(tag, _)| tag.eq_ignore_ascii_case(name))
            .find_map(|(_, value)| present(value))
    }

    /// Tags of `self`, then tags of `other` that `self` has no present value for.
    pub fn merged(&self, other: &TagTable) -> TagTable {
        let mut merged = self.clone();
        for (name, value) in &other.tags {
            if merged.get(name).is_none() {
                merged.push(name, value);
            }
        }
        merged
    }
}

/// Fully materialized record; every provider parses into one of these.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    origin: String,
    tags: IndexMap<String, Vec<String>>,
    loops: Vec<Loop>,
    saveframes: Vec<TagTable>,
}

impl MemoryRecord {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, path: &str, value: &str) -> Self {
        self.push_tag(path, value);
        self
    }

    pub fn with_loop(mut self, table: Loop) -> Self {
        self.push_loop(table);
        self
    }

    pub fn with_saveframe(mut self, frame: TagTable) -> Self {
        self.push_saveframe(frame);
        self
    }

    pub fn push_tag(&mut self, path: &str, value: &str) {
        self.tags
            .entry(path.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }

    pub fn push_loop(&mut self, table: Loop) {
        self.loops.push(table);
    }

    /// Stores the frame and indexes its tags under `Prefix.tag`.
    pub fn push_saveframe(&mut self, frame: TagTable) {
        for (name, value) in frame.tags() {
            let path = format!("{}.{}", frame.prefix(), name);
            self.push_tag(&path, value);
        }
        self.saveframes.push(frame);
    }
}

impl RecordSource for MemoryRecord {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn get_tag(&self, path: &str) -> Vec<String> {
        self.tags
            .get(&path.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn get_loops(&self, category: &str) -> Vec<Loop> {
        self.loops
            .iter()
            .filter(|table| table.category().eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    fn get_saveframe_tags(&self, category: &str) -> Vec<TagTable> {
        self.saveframes
            .iter()
            .filter(|frame| frame.category().eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }
}

/// A primary record whose missing sample and spectrometer metadata is filled
/// in from a companion record describing the same spectrum. Peak data always
/// comes from the primary alone.
pub struct LayeredRecord<P, S> {
    primary: P,
    secondary: S,
}

impl<P: RecordSource, S: RecordSource> LayeredRecord<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: RecordSource, S: RecordSource> RecordSource for LayeredRecord<P, S> {
    fn origin(&self) -> &str {
        self.primary.origin()
    }

    fn get_tag(&self, path: &str) -> Vec<String> {
        let values = self.primary.get_tag(path);
        if values.iter().any(|value| present(value).is_some()) {
            return values;
        }
        let fallback = self.secondary.get_tag(path);
        if fallback.is_empty() { values } else { fallback }
    }

    fn get_loops(&self, category: &str) -> Vec<Loop> {
        let primary = self.primary.get_loops(category);
        if !is_one_of(category, &SUPPLEMENT_LOOPS) {
            return primary;
        }
        let secondary = self.secondary.get_loops(category);
        merge_pairwise(primary, secondary, Loop::merged)
    }

    fn get_saveframe_tags(&self, category: &str) -> Vec<TagTable> {
        let primary = self.primary.get_saveframe_tags(category);
        if !is_one_of(category, &SUPPLEMENT_FRAMES) {
            return primary;
        }
        let secondary = self.secondary.get_saveframe_tags(category);
        merge_pairwise(primary, secondary, TagTable::merged)
    }
}

fn is_one_of(category: &str, categories: &[&str]) -> bool {
    categories
        .iter()
        .any(|known| known.eq_ignore_ascii_case(category))
}

fn merge_pairwise<T: Clone>(primary: Vec<T>, secondary: Vec<T>, merge: fn(&T, &T) -> T) -> Vec<T> {
    let count = primary.len().max(secondary.len());
    (0..count)
        .filter_map(|index| match (primary.get(index), secondary.get(index)) {
            (Some(first), Some(second)) => Some(merge(first, second)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(second)) => Some(second.clone()),
            (None, None) => None,
        })
        .collect()
}
