use serde::Serialize;

/// One label and how many times it was seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u32,
}

/// Ordered copy of the detection counts: descending count, ties in
/// first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<LabelCount>,
}

impl Snapshot {
    pub(crate) fn new(entries: Vec<LabelCount>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelCount> {
        self.entries.iter()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }

    pub fn count_of(&self, label: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Spoken form: `"2 person, 1 chair"`
    pub fn utterance(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.count, e.label))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_format() {
        let snapshot = Snapshot::new(vec![
            LabelCount {
                label: "person".into(),
                count: 2,
            },
            LabelCount {
                label: "chair".into(),
                count: 1,
            },
        ]);

        assert_eq!(snapshot.utterance(), "2 person, 1 chair");
        assert_eq!(snapshot.total(), 3);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.utterance(), "");
        assert_eq!(snapshot.count_of("person"), 0);
    }
}
