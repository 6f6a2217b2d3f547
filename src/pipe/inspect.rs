/// Passes every item through unchanged after handing a reference to `f`.
/// Used to log or count anomalies on their way out of the aggregator.
pub fn inspect<T>(mut f: impl FnMut(&T)) -> impl FnMut(T) -> Option<T>
where
    T: Send,
{
    move |item| {
        f(&item);
        Some(item)
    }
}
