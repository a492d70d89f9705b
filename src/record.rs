pub use streamprobe_macros::FlatRecord;

/// Flat `name -> number` view of a record, for tabular output and reports.
///
/// Implemented with `#[derive(FlatRecord)]` from `streamprobe-macros`.
pub trait FlatRecord {
    /// Field names in declaration order.
    fn field_names() -> &'static [&'static str]
    where
        Self: Sized;

    fn fields(&self) -> Vec<(&'static str, f64)>;

    fn get(&self, name: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}
