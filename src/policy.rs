use uuid::Uuid;

/// What the actor is trying to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	Read,
	/// Creating a resource that does not exist yet.
	Create,
	/// Updating or deleting an existing resource.
	Mutate,
}

/// Who owns the target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
	User(Uuid),
	/// Ownerless taxonomy (categories, tags).
	Shared,
}

/// Pure authorization decision, anyone-can-read / author-can-write:
///
/// - reads are always allowed, visibility filtering is the access layer's job;
/// - any write requires an authenticated actor;
/// - mutating an owned resource additionally requires being its owner.
///
/// Staff and superuser flags carry no weight here; administrative paths do
/// not go through this function.
#[must_use]
pub fn can_act(actor: Option<Uuid>, action: Action, owner: Owner) -> bool {
	match action {
		Action::Read => true,
		Action::Create => actor.is_some(),
		Action::Mutate => match owner {
			Owner::Shared => actor.is_some(),
			Owner::User(owner_id) => actor == Some(owner_id),
		},
	}
}
