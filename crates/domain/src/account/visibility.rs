//! Visibility of comments and replies relative to their author and subject.

use common::{Comment, ProductId, User, UserId};

/// A comment or reply is hidden while its author or its subject product is
/// disabled.
pub fn derived_disabled(author_disabled: bool, subject_disabled: bool) -> bool {
    author_disabled || subject_disabled
}

/// Re-derives the disabled flags of everything one author wrote.
#[derive(Debug, Clone, Copy)]
pub struct CommentVisibility {
    author: UserId,
    author_disabled: bool,
}

impl CommentVisibility {
    pub fn for_author(user: &User) -> Self {
        Self {
            author: user.id,
            author_disabled: user.is_disabled,
        }
    }

    /// Applies [`derived_disabled`] to the comment and to each of its replies
    /// written by this author that are currently hidden. Visible parts and
    /// parts written by others are left alone.
    ///
    /// `subject_disabled` reports whether a product is disabled; returns true
    /// if any flag changed.
    pub fn apply(
        &self,
        comment: &mut Comment,
        subject_disabled: impl Fn(ProductId) -> bool,
    ) -> bool {
        let mut changed = false;

        if comment.user_id == self.author && comment.is_disabled {
            let disabled =
                derived_disabled(self.author_disabled, subject_disabled(comment.product_id));
            changed |= comment.is_disabled != disabled;
            comment.is_disabled = disabled;
        }

        for reply in comment
            .replies
            .iter_mut()
            .filter(|r| r.user_id == self.author && r.is_disabled)
        {
            let disabled =
                derived_disabled(self.author_disabled, subject_disabled(reply.product_id));
            changed |= reply.is_disabled != disabled;
            reply.is_disabled = disabled;
        }

        changed
    }
}
