/// Observer of entity events in a stateful session.
///
/// Hooks receive the mapped table name and the identifier rendered as text.
/// All hooks default to no-ops.
pub trait Interceptor: Send {
    fn on_load(&self, _entity: &str, _id: &str) {}

    fn on_save(&self, _entity: &str, _id: &str) {}

    fn on_update(&self, _entity: &str, _id: &str) {}

    fn on_delete(&self, _entity: &str, _id: &str) {}

    /// Called before queued writes are executed.
    fn on_flush(&self, _pending: usize) {}
}
