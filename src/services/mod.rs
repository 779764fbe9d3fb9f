pub mod collection;
pub mod mutations;
pub mod providers;
pub mod search;
pub mod session;

pub use collection::CollectionView;
pub use mutations::{AddRequest, MutationOutcome, MutationPipeline};
pub use search::{SearchDebouncer, Suggestions};
pub use session::{SessionManager, SubscriptionHandle};
