/// Return this error from a virtual user's behaviour function to indicate that the user is bailing.
///
/// This should be used when a user encounters an error that is fatal to that user but not to the
/// run. The user stops iterating and the pool may start a fresh user in its place on a later
/// scheduler tick if the ramp still calls for one.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct UserBailError {
    msg: String,
}

impl UserBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for UserBailError {
    fn default() -> Self {
        Self {
            msg: "Virtual user is bailing".to_string(),
        }
    }
}
