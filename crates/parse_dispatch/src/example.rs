use anyhow::{anyhow, Context, Result};

/// The contract the dispatch loop needs from a record.
///
/// Everything else about a record is opaque to the loop: it only asks the
/// record to finalize itself after a read, to turn itself into an end-of-pass
/// marker, and to wipe itself when it goes back to the pool.
pub trait Record: Send {
    /// Resets the label to "no label", used when building a pass marker.
    fn default_label(&mut self);

    /// Sets or clears the end-of-pass flag.
    fn set_end_pass(&mut self, end_pass: bool);

    /// Whether this record marks the end of a pass.
    fn is_end_pass(&self) -> bool;

    /// Post-read finalization, run on every record of a successful read
    /// before the batch is dispatched.
    fn setup(&mut self) {}

    /// Returns the record to its freshly-allocated state.
    fn clear(&mut self);
}

/// A named feature with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub value: f32,
}

/// The `Example` struct is the record type produced by the bundled readers.
///
/// It is parsed from lines of the form
/// `[label [weight]] ['tag] | name[:value] name[:value] ...`
///
/// # Examples:
/// - `1 | price:0.23 sqft:0.25` -> label 1.0, two features
/// - `-1 2.0 'house_17 | sqft` -> label -1.0, weight 2.0, tag "house_17", `sqft` = 1.0
/// - `| a b c` -> unlabeled, three features
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub label: Option<f32>,
    pub weight: f32,
    pub tag: Option<String>,
    pub features: Vec<Feature>,
    pub end_pass: bool,
    /// Sum of squared feature values, filled in by `setup`.
    pub total_sum_feat_sq: f32,
}

impl Default for Example {
    fn default() -> Self {
        Self {
            label: None,
            weight: 1.0,
            tag: None,
            features: Vec::new(),
            end_pass: false,
            total_sum_feat_sq: 0.0,
        }
    }
}

impl Example {
    /// Overwrites this example with the contents of one text line.
    ///
    /// Reuses the feature buffer so pooled examples don't reallocate.
    pub fn parse_line(&mut self, line: &str) -> Result<()> {
        self.clear();

        let (header, body) = line
            .split_once('|')
            .ok_or_else(|| anyhow!("missing '|' separating label from features"))?;

        let mut words = header.split_whitespace().peekable();
        if let Some(word) = words.next_if(|w| !w.starts_with('\'')) {
            let label = word
                .parse::<f32>()
                .with_context(|| format!("invalid label '{}'", word))?;
            self.label = Some(label);

            if let Some(word) = words.next_if(|w| !w.starts_with('\'')) {
                self.weight = word
                    .parse::<f32>()
                    .with_context(|| format!("invalid weight '{}'", word))?;
            }
        }
        if let Some(word) = words.next() {
            match word.strip_prefix('\'') {
                Some(tag) => self.tag = Some(tag.to_string()),
                None => return Err(anyhow!("unexpected token '{}' before '|'", word)),
            }
        }
        if let Some(word) = words.next() {
            return Err(anyhow!("unexpected token '{}' before '|'", word));
        }

        for word in body.split_whitespace() {
            let (name, value) = match word.split_once(':') {
                Some((name, value)) => {
                    let value = value.parse::<f32>().with_context(|| {
                        format!("invalid value '{}' for feature '{}'", value, name)
                    })?;
                    (name, value)
                }
                None => (word, 1.0),
            };
            self.features.push(Feature {
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Returns the value of a feature by name, if present.
    pub fn feature(&self, name: &str) -> Option<f32> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value)
    }
}

impl Record for Example {
    fn default_label(&mut self) {
        self.label = None;
        self.weight = 1.0;
    }

    fn set_end_pass(&mut self, end_pass: bool) {
        self.end_pass = end_pass;
    }

    fn is_end_pass(&self) -> bool {
        self.end_pass
    }

    fn setup(&mut self) {
        self.total_sum_feat_sq = self.features.iter().map(|f| f.value * f.value).sum();
    }

    fn clear(&mut self) {
        self.label = None;
        self.weight = 1.0;
        self.tag = None;
        self.features.clear();
        self.end_pass = false;
        self.total_sum_feat_sq = 0.0;
    }
}
