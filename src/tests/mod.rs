//! Router tests driving the full application through `tower::ServiceExt`.
