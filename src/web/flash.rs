use crate::web::escape_html;

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "logged_out" => "You have been signed out.",
            "registered" => "Welcome! Your account is ready.",
            "login_required" => "Please sign in to continue.",
            "submitted" => "Thank you! Your contribution is waiting for review.",
            "created" => "User created.",
            "user_deleted" => "User deleted.",
            "password_updated" => "Password updated.",
            "approved" => "Contribution approved and published.",
            "rejected" => "Contribution rejected.",
            "deleted" => "Contribution deleted.",
            "culture_created" => "Culture entry added.",
            "culture_deleted" => "Culture entry removed.",
            "article_created" => "Article published.",
            "article_deleted" => "Article removed.",
            "quiz_models_saved" => "Quiz model updated.",
            "quiz_prompts_saved" => "Quiz prompt updated.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = describe_error(error);
        return format!(
            r#"<div class="flash error">{message}</div>"#,
            message = escape_html(&message)
        );
    }

    String::new()
}

fn describe_error(code: &str) -> String {
    let fixed = match code {
        "invalid_credentials" => "Wrong username or password.",
        "not_authorized" => "Administrator access is required.",
        "terms_required" => "Please accept the terms of contribution to register.",
        "invalid_username" => "Usernames are 3 to 32 letters, digits, dots, dashes or underscores.",
        "weak_password" => "Passwords need at least 8 characters.",
        "duplicate" => "That username is already taken.",
        "missing_username" => "Please enter a username.",
        "missing_password" => "Please enter a password.",
        "user_missing" => "User not found.",
        "self_delete" => "You cannot delete your own account.",
        "contribution_missing" => "That contribution no longer exists.",
        "already_reviewed" => "That contribution has already been reviewed.",
        "unknown_kind" => "Please choose a contribution type.",
        "upload_failed" => "The upload could not be read. Please try again.",
        "article_duplicate" => "An article with that title already exists.",
        "article_missing" => "Article not found.",
        "culture_missing" => "Culture entry not found.",
        "quiz_invalid_models" => "Please provide a model name with a provider prefix.",
        "quiz_invalid_prompts" => "The prompt must mention {{COUNT}} and {{DIFFICULTY}}.",
        _ => "",
    };
    if !fixed.is_empty() {
        return fixed.to_string();
    }

    let field_message = [
        ("missing_", "Please fill in"),
        ("invalid_", "Please check"),
        ("too_large_", "The file is too large for"),
        ("bad_type_", "Unsupported file type for"),
    ]
    .iter()
    .find_map(|(prefix, lead)| {
        code.strip_prefix(prefix)
            .map(|field| format!("{lead} the {} field.", field.replace('_', " ")))
    });

    field_message.unwrap_or_else(|| "Something went wrong. Please check the logs.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_render_success_messages() {
        let html = compose_flash_message(Some("submitted"), None);
        assert!(html.contains("flash success"));
        assert!(html.contains("waiting for review"));
        assert!(compose_flash_message(Some("nonsense"), None).is_empty());
    }

    #[test]
    fn field_error_codes_name_the_field() {
        let html = compose_flash_message(None, Some("too_large_image"));
        assert!(html.contains("flash error"));
        assert!(html.contains("too large for the image field"));
        let html = compose_flash_message(None, Some("invalid_correct_index"));
        assert!(html.contains("correct index"));
    }

    #[test]
    fn unknown_codes_fall_back_to_a_generic_message() {
        let html = compose_flash_message(None, Some("<script>"));
        assert!(html.contains("Something went wrong"));
        assert!(!html.contains("<script>"));
    }
}
