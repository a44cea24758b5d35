/// Classification for retry policy.
///
/// Used by the retry decorator and the fallback coordinator to decide how to
/// respond to an error coming back from a provider.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Degrade to "unresolved"? | Abort the run? |
/// |-------|---------------------|--------------------------|----------------|
/// | `Never` | No | Yes | No |
/// | `WithBackoff` | Yes, with a retry decorator | Yes, once retries are exhausted | No |
/// | `NextProvider` | No | Yes, the fallback provider may still answer | No |
/// | `Fatal` | No | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, unsupported operation or malformed data.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Transient failure: timeout, HTTP 429 or a 5xx answer.
    WithBackoff,

    /// This provider cannot answer but another one might.
    NextProvider,

    /// Credential failure. Nothing else in the run can succeed without it.
    Fatal,
}
