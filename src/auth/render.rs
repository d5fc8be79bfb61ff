//! HTML views
//!
//! Only [`DisplayProfile`] fields are ever interpolated; credentials
//! have no path into markup.

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::profile::DisplayProfile;
use super::provider::ProviderRegistry;

/// Login links for every registered provider
pub fn index_page(providers: &ProviderRegistry) -> String {
    let links: String = providers
        .iter()
        .map(|provider| {
            format!(
                "    <p><a href=\"/auth/{}\">Log in with {}</a></p>\n",
                encode_double_quoted_attribute(provider.name()),
                encode_text(provider.display_name()),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login</title></head>
<body>
{links}</body>
</html>
"#
    )
}

/// Signed-in view
pub fn user_page(provider: &str, profile: &DisplayProfile) -> String {
    let field = |value: &Option<String>| encode_text(value.as_deref().unwrap_or("")).into_owned();

    let avatar = profile
        .avatar_url
        .as_deref()
        .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
        .map(|url| {
            format!(
                "<img src=\"{}\" alt=\"avatar\">",
                encode_double_quoted_attribute(url)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Signed in</title></head>
<body>
    <p><a href="/logout/{provider}">logout</a></p>
    <p>Name: {name} [{last_name}, {first_name}]</p>
    <p>Email: {email}</p>
    <p>NickName: {nickname}</p>
    <p>Location: {location}</p>
    <p>AvatarURL: {avatar_url} {avatar}</p>
    <p>Description: {description}</p>
    <p>UserID: {user_id}</p>
</body>
</html>
"#,
        provider = encode_double_quoted_attribute(provider),
        name = field(&profile.name),
        last_name = field(&profile.last_name),
        first_name = field(&profile.first_name),
        email = field(&profile.email),
        nickname = field(&profile.nickname),
        location = field(&profile.location),
        avatar_url = field(&profile.avatar_url),
        avatar = avatar,
        description = field(&profile.description),
        user_id = encode_text(&profile.user_id),
    )
}
