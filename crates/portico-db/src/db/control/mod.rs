pub mod api_key;
pub mod invitation;
pub mod membership;
pub mod organization;

pub use api_key::ApiKeyRepository;
pub use invitation::InvitationRepository;
pub use membership::MembershipRepository;
pub use organization::OrganizationRepository;
