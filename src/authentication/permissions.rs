use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoppingCart,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoppingCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnShoppingCart,
    ManageOwnSubscriptions,

    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(r, actions)| {
                if role != r {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: String::from("someone"),
            role,
        }
    }

    #[test]
    fn users_manage_only_their_own_things() {
        let user = session(UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnShoppingCart.authenticate(&user));
        assert!(!ActionType::ManageTags.authenticate(&user));
        assert!(!ActionType::ManageIngredients.authenticate(&user));
    }

    #[test]
    fn admins_manage_the_catalogue() {
        let admin = session(UserRole::Admin);

        assert!(ActionType::ManageTags.authenticate(&admin));
        assert!(ActionType::ManageIngredients.authenticate(&admin));
    }

    #[test]
    fn only_authors_modify_recipes() {
        let user = session(UserRole::User);
        let admin = session(UserRole::Admin);

        assert!(user
            .authenticate_owner(1, ActionType::ManageOwnRecipes)
            .is_ok());
        assert!(admin
            .authenticate_owner(1, ActionType::ManageOwnRecipes)
            .is_ok());

        let e = user
            .authenticate_owner(2, ActionType::ManageOwnRecipes)
            .unwrap_err();
        assert_eq!(e.code as u16, 403);
        let e = admin
            .authenticate_owner(2, ActionType::ManageOwnRecipes)
            .unwrap_err();
        assert_eq!(e.code as u16, 403);
    }
}
