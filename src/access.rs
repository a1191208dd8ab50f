use tracing::debug;

use crate::models::{Dataset, Identity};

pub fn restrict_to_identity(data: &Dataset, identity: &Identity) -> Dataset {
    if identity.is_admin() {
        return data.clone();
    }

    let visible = data.filtered(|record| record.username.as_deref() == Some(identity.username.as_str()));
    debug!(
        total = data.len(),
        visible = visible.len(),
        "restricted dataset to own records"
    );
    visible
}
