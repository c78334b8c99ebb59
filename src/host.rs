/// Everything a running program may touch outside its own graph.
///
/// The VM is single-threaded and awaits each call before doing anything
/// else, so implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Receives one decoded output character.
    fn put_char(&mut self, c: char);

    /// Next input character, or `None` at end of input. If the call is about
    /// to block, `on_wait` may be invoked once; it yields a dump of the
    /// program for display while waiting.
    async fn get_char(&mut self, on_wait: impl FnOnce() -> String) -> Option<char>;

    fn rand_byte(&mut self) -> u8;

    fn log(&mut self, text: &str);

    fn error(&mut self, text: &str);

    /// Cooperative yield between reductions. Returns `true` to abort.
    async fn sleep(&mut self) -> bool;
}
