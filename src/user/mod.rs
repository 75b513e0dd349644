use crate::id::uuid_id;

uuid_id!(
    /// Opaque reference to an account owned by the user directory.
    Id
);
