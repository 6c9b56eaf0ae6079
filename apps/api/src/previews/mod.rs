// Export previews of the selected headshot: LinkedIn avatar, resume photo and
// a rendered business card. All pixel work runs on the blocking pool.

pub mod business_card;
pub mod handlers;

pub use business_card::BusinessCardRenderer;
