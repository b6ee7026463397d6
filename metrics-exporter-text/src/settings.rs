use metrics_registry::{ParseError, Tag};

/// Rendering options shared by every exporter.
#[derive(Clone, Debug)]
pub struct ExportSettings {
    pub(crate) help: bool,
    pub(crate) global_tags: Vec<Tag>,
}

impl ExportSettings {
    /// Creates an [`ExportSettingsBuilder`].
    pub fn builder() -> ExportSettingsBuilder {
        ExportSettingsBuilder::new()
    }

    /// Whether or not help lines are rendered.
    pub fn help_enabled(&self) -> bool {
        self.help
    }

    /// Tags added to every rendered metric.
    pub fn global_tags(&self) -> &[Tag] {
        &self.global_tags
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettingsBuilder::new().build()
    }
}

/// Builder for [`ExportSettings`].
#[derive(Clone, Debug)]
pub struct ExportSettingsBuilder {
    help: bool,
    global_tags: Vec<Tag>,
}

impl ExportSettingsBuilder {
    fn new() -> Self {
        ExportSettingsBuilder { help: true, global_tags: Vec::new() }
    }

    /// Sets whether or not help lines are rendered for metrics that have a description.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_help(mut self, help: bool) -> Self {
        self.help = help;
        self
    }

    /// Adds tags to every rendered metric.
    ///
    /// Tags on the metric itself take precedence over global tags with the same key.
    #[must_use]
    pub fn with_global_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        self.global_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds tags, given as a `key=value,key2=value2` expression, to every rendered metric.
    ///
    /// # Errors
    ///
    /// If the expression cannot be parsed, an error variant will be returned describing why.
    pub fn with_global_tags_expr(self, expr: &str) -> Result<Self, ParseError> {
        let tags = Tag::parse_list(expr)?;
        Ok(self.with_global_tags(tags))
    }

    /// Builds the [`ExportSettings`].
    pub fn build(self) -> ExportSettings {
        ExportSettings { help: self.help, global_tags: self.global_tags }
    }
}

#[cfg(test)]
mod tests {
    use metrics_registry::{ParseError, Tag};

    use super::ExportSettings;

    #[test]
    fn test_defaults() {
        let settings = ExportSettings::default();
        assert!(settings.help_enabled());
        assert!(settings.global_tags().is_empty());
    }

    #[test]
    fn test_global_tags() {
        let settings = ExportSettings::builder()
            .with_help(false)
            .with_global_tags([("region", "eu")])
            .with_global_tags_expr("host=a,rack=b\\,c")
            .unwrap()
            .build();

        assert!(!settings.help_enabled());
        assert_eq!(
            settings.global_tags(),
            &[Tag::new("region", "eu"), Tag::new("host", "a"), Tag::new("rack", "b,c")]
        );
    }

    #[test]
    fn test_bad_expression() {
        let result = ExportSettings::builder().with_global_tags_expr("novalue");
        assert!(matches!(result, Err(ParseError::MalformedTags { .. })));
    }
}
