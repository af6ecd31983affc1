use chatrelay_core_types::ChatContext;

/// Text typed after the message when the context carries code: a fenced
/// block tagged with the language, preceded by the file and cursor when
/// known. `None` when there is no code to send.
pub fn render_context_block(context: &ChatContext) -> Option<String> {
    if !context.has_code() {
        return None;
    }
    let code = context.selected_code.as_deref().unwrap_or_default();
    let mut header = String::from("Code context");
    match (&context.current_file, context.cursor_position) {
        (Some(file), Some(cursor)) => {
            header.push_str(&format!(" ({file}:{}:{})", cursor.line, cursor.character))
        }
        (Some(file), None) => header.push_str(&format!(" ({file})")),
        _ => {}
    }
    let language = context.language.as_deref().unwrap_or_default();
    Some(format!("\n\n{header}:\n```{language}\n{code}\n```"))
}
