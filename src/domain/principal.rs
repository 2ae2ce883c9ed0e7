use uuid::Uuid;

use super::order::OrderView;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    /// Staff users may read every order.
    pub is_staff: bool,
}

impl Principal {
    pub fn new(user_id: Uuid, is_staff: bool) -> Self {
        Self { user_id, is_staff }
    }

    pub fn owns(&self, order: &OrderView) -> bool {
        order.user_id == self.user_id
    }

    pub fn can_view(&self, order: &OrderView) -> bool {
        self.is_staff || self.owns(order)
    }

    /// Owner filter for order listings; `None` means unrestricted.
    pub fn order_scope(&self) -> Option<Uuid> {
        if self.is_staff {
            None
        } else {
            Some(self.user_id)
        }
    }
}
