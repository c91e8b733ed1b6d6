//! Viewer identity and course scope shared by the player components.

/// Who is watching and which course they are in.
///
/// Built once per page session and passed by reference; nothing reads the
/// viewer identity from global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerContext {
    email: Option<String>,
    course_name: String,
}

impl ViewerContext {
    /// Create a new context. A blank email counts as signed out.
    pub fn new(email: Option<String>, course_name: impl Into<String>) -> Self {
        Self {
            email: email.filter(|e| !e.trim().is_empty()),
            course_name: course_name.into(),
        }
    }

    /// Create a context for a signed-out viewer.
    pub fn anonymous(course_name: impl Into<String>) -> Self {
        Self::new(None, course_name)
    }

    /// Get the viewer's email, if signed in.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Course name, or `None` when blank.
    pub fn course_name(&self) -> Option<&str> {
        let name = self.course_name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Check if the viewer has an identity.
    pub fn is_signed_in(&self) -> bool {
        self.email.is_some()
    }
}
