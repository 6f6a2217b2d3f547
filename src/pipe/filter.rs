/// Only passes items that satisfy the predicate.
pub fn filter<T>(mut predicate: impl FnMut(&T) -> bool) -> impl FnMut(T) -> Option<T>
where
    T: Send,
{
    move |item| {
        if predicate(&item) { Some(item) } else { None }
    }
}
