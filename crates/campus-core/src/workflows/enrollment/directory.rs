use tracing::info;

use super::domain::{ApprovalStatus, RegisterUser, Role, User, UserId, UserProfile};
use super::error::{ConflictReason, LifecycleError};
use super::notify::Notifier;
use super::service::{next_id, EnrollmentService};
use super::store::{LedgerStore, LedgerView};

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    /// Create a student, institute, or company account. Administrators are provisioned
    /// out of band through [`EnrollmentService::bootstrap_admin`].
    pub fn register_user(&self, request: RegisterUser) -> Result<User, LifecycleError> {
        validate_profile(&request.profile)?;
        if request.role == Role::Admin {
            return Err(LifecycleError::forbidden(
                &UserId::new("anonymous"),
                "register an administrator",
            ));
        }

        let approval = if request.role.requires_approval() {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        };
        let now = self.now();

        let stored = self.store.transact(|txn| {
            if email_taken(&*txn, &request.profile.email) {
                return Err(ConflictReason::DuplicateEmail.into());
            }
            let user = User {
                id: unused_user_id(&*txn, || next_id("usr")),
                role: request.role,
                approval,
                verified: false,
                profile: request.profile,
                created_at: now,
            };
            txn.put_user(user.clone());
            Ok(user)
        })?;

        info!(user_id = %stored.id, role = stored.role.label(), "user registered");
        Ok(stored)
    }

    /// Ensure the configured administrator exists. Repeated calls are no-ops.
    pub fn bootstrap_admin(&self, id: UserId, email: &str) -> Result<User, LifecycleError> {
        let now = self.now();
        self.store.transact(|txn| {
            if let Some(existing) = txn.user(&id) {
                return Ok(existing);
            }
            let admin = User {
                id: id.clone(),
                role: Role::Admin,
                approval: ApprovalStatus::Approved,
                verified: true,
                profile: UserProfile {
                    name: "Administrator".to_string(),
                    email: email.to_string(),
                    ..UserProfile::default()
                },
                created_at: now,
            };
            txn.put_user(admin.clone());
            Ok(admin)
        })
    }

    pub fn user(&self, id: &UserId) -> Result<User, LifecycleError> {
        self.store
            .read(|view| view.user(id).ok_or_else(|| LifecycleError::not_found("user", id)))
    }

    /// Approve or reject an institute/company account.
    pub fn set_approval(
        &self,
        admin_id: &UserId,
        user_id: &UserId,
        approval: ApprovalStatus,
    ) -> Result<User, LifecycleError> {
        if approval == ApprovalStatus::Pending {
            return Err(LifecycleError::validation(
                "approval decision must be approved or rejected",
            ));
        }

        let updated = self.store.transact(|txn| {
            require_admin(&*txn, admin_id, "change account approval")?;
            let mut user = txn
                .user(user_id)
                .ok_or_else(|| LifecycleError::not_found("user", user_id))?;
            if !user.role.requires_approval() {
                return Err(LifecycleError::validation(format!(
                    "{} accounts do not go through approval",
                    user.role.label()
                )));
            }
            user.approval = approval;
            txn.put_user(user.clone());
            Ok(user)
        })?;

        info!(user_id = %updated.id, approval = ?updated.approval, admin_id = %admin_id, "account approval updated");
        Ok(updated)
    }

    pub fn verify_user(&self, admin_id: &UserId, user_id: &UserId) -> Result<User, LifecycleError> {
        let updated = self.store.transact(|txn| {
            require_admin(&*txn, admin_id, "verify accounts")?;
            let mut user = txn
                .user(user_id)
                .ok_or_else(|| LifecycleError::not_found("user", user_id))?;
            user.verified = true;
            txn.put_user(user.clone());
            Ok(user)
        })?;

        info!(user_id = %updated.id, admin_id = %admin_id, "account verified");
        Ok(updated)
    }
}

/// Resolve the acting user and check their role. Unknown actors are treated as forbidden so
/// callers cannot discover which ids exist.
pub(crate) fn require_role<V: LedgerView + ?Sized>(
    view: &V,
    actor: &UserId,
    roles: &[Role],
    action: &'static str,
) -> Result<User, LifecycleError> {
    match view.user(actor) {
        Some(user) if roles.contains(&user.role) => Ok(user),
        _ => Err(LifecycleError::forbidden(actor, action)),
    }
}

/// Draw ids until one is free. Bootstrapped accounts may already hold a generated-looking id.
pub(crate) fn unused_user_id<V, G>(view: &V, mut generate: G) -> UserId
where
    V: LedgerView + ?Sized,
    G: FnMut() -> String,
{
    loop {
        let candidate = UserId(generate());
        if view.user(&candidate).is_none() {
            return candidate;
        }
    }
}

fn require_admin<V: LedgerView + ?Sized>(
    view: &V,
    actor: &UserId,
    action: &'static str,
) -> Result<User, LifecycleError> {
    require_role(view, actor, &[Role::Admin], action)
}

fn email_taken<V: LedgerView + ?Sized>(view: &V, email: &str) -> bool {
    view.users()
        .iter()
        .any(|user| user.profile.email.eq_ignore_ascii_case(email))
}

fn validate_profile(profile: &UserProfile) -> Result<(), LifecycleError> {
    if profile.name.trim().is_empty() {
        return Err(LifecycleError::validation("profile name is required"));
    }
    let email = profile.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(LifecycleError::validation("profile email must be an address"));
    }
    Ok(())
}
