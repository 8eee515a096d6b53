/// Category portion of a stream name: everything before the first `-`.
///
/// Type qualifiers (`:command`, `+audit`) stay part of the category. A name
/// without a `-` is already a category and is returned unchanged.
///
/// # Examples
///
/// ```
/// use message_consumer::message_db::utils::category;
///
/// assert_eq!(category("account-123"), "account");
/// assert_eq!(category("account:command-123"), "account:command");
/// assert_eq!(category("account"), "account");
/// ```
pub fn category(stream_name: &str) -> &str {
    match stream_name.split_once('-') {
        Some((category, _)) => category,
        None => stream_name,
    }
}

/// Entity id portion of a stream name: everything after the first `-`.
///
/// ```
/// use message_consumer::message_db::utils::id;
///
/// assert_eq!(id("account-123-456"), Some("123-456"));
/// assert_eq!(id("account"), None);
/// ```
pub fn id(stream_name: &str) -> Option<&str> {
    stream_name.split_once('-').map(|(_, id)| id)
}

/// True when the name addresses a whole category rather than a single stream
pub fn is_category(stream_name: &str) -> bool {
    !stream_name.contains('-')
}
