mod encoding;
pub use encoding::{FromBech32, ToBech32};

mod util;
pub use util::{getenv, getenv_default, now_rfc3339, parse_rfc3339};
