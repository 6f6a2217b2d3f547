/// Chains stages left to right into a single [`crate::Stage`].
///
/// ```
/// use roda_pulse::{RequestEvent, Stage, filter, pipe, progress};
///
/// let mut intake = pipe![
///     filter(|e: &RequestEvent| e.route.starts_with("/api")),
///     progress("intake", 10_000),
/// ];
/// let mut kept = Vec::new();
/// intake.process(RequestEvent::new(0, "/api/users", 200), &mut |e: RequestEvent| kept.push(e));
/// intake.process(RequestEvent::new(1, "/favicon.ico", 404), &mut |e: RequestEvent| kept.push(e));
/// assert_eq!(kept.len(), 1);
/// ```
#[macro_export]
macro_rules! pipe {
    ($stage:expr) => { $stage };
    ($stage:expr, $($rest:expr),+ $(,)?) => {
        {
            use $crate::StageExt;
            $stage.pipe($crate::pipe!($($rest),+))
        }
    };
}
