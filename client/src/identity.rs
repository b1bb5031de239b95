use tracing::{debug, warn};
use valdore_common::backend::Backend;
use valdore_common::identity::{generate_guest_token, Actor};

use crate::storage::{LocalStorage, KEY_CHAT_USER_ID};

/// Decide who is using the storefront on this page load.
///
/// A signed-in account wins. Otherwise the guest token stored under
/// `chat_user_id` is reused, or a new one is generated and stored. When
/// storage fails the token lives for this load only and the returned actor
/// has `persisted == false`.
pub fn resolve_actor<B: Backend>(backend: &B, storage: &dyn LocalStorage, guest_label: &str) -> Actor {
    if let Some(user) = backend.current_user() {
        return Actor::account(&user);
    }

    match storage.get_item(KEY_CHAT_USER_ID) {
        Ok(Some(token)) if !token.trim().is_empty() => {
            return Actor::guest(token, guest_label, true);
        }
        Ok(_) => {}
        Err(e) => {
            warn!("cannot read guest id from local storage: {e}");
            return Actor::guest(generate_guest_token(), guest_label, false);
        }
    }

    let token = generate_guest_token();
    let persisted = match storage.set_item(KEY_CHAT_USER_ID, &token) {
        Ok(()) => true,
        Err(e) => {
            warn!("cannot persist guest id, identity will not survive reload: {e}");
            false
        }
    };
    debug!(persisted, "generated guest id");
    Actor::guest(token, guest_label, persisted)
}
