mod comment;
mod submission;
mod template;
mod user;

pub use comment::*;
pub use submission::*;
pub use template::*;
pub use user::*;
