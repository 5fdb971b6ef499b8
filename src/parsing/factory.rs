//! Parser factory for creating language-specific parsers
//! 
//! This module provides a factory for creating parsers based on
//! language detection and configuration settings.

use std::sync::Arc;
use crate::Settings;
use super::{CSharpParser, GoParser, JavaParser, JavaScriptParser, Language, LanguageParser, PythonParser, RustParser, TypeScriptParser};

/// Factory for creating language parsers based on configuration
pub struct ParserFactory {
    settings: Arc<Settings>,
}

impl ParserFactory {
    /// Create a new parser factory with the given settings
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
    
    /// Create a parser for the specified language
    pub fn create_parser(&self, language: Language) -> Result<Box<dyn LanguageParser>, String> {
        // Check if language is enabled in settings
        let lang_key = language.config_key();
        if let Some(config) = self.settings.languages.get(lang_key) {
            if !config.enabled {
                return Err(format!("Language {} is disabled in configuration", language.name()));
            }
        }
        
        match language {
            Language::Rust => Ok(Box::new(RustParser::new()?)),
            Language::Python => Ok(Box::new(PythonParser::new()?)),
            Language::JavaScript => Ok(Box::new(JavaScriptParser::new()?)),
            Language::TypeScript => Ok(Box::new(TypeScriptParser::new()?)),
            Language::Go => Ok(Box::new(GoParser::new()?)),
            Language::Java => Ok(Box::new(JavaParser::new()?)),
            Language::CSharp => Ok(Box::new(CSharpParser::new()?)),
        }
    }
    
    /// Check if a language is enabled
    pub fn is_language_enabled(&self, language: Language) -> bool {
        let lang_key = language.config_key();
        self.settings.languages
            .get(lang_key)
            .map(|config| config.enabled)
            .unwrap_or(false)
    }
    
    /// Get all enabled languages
    pub fn enabled_languages(&self) -> Vec<Language> {
        Language::all()
            .iter()
            .copied()
            .filter(|&lang| self.is_language_enabled(lang))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_create_rust_parser() {
        let settings = Arc::new(Settings::default());
        let factory = ParserFactory::new(settings);
        
        let parser = factory.create_parser(Language::Rust);
        assert!(parser.is_ok());
        
        let parser = parser.unwrap();
        assert_eq!(parser.language(), Language::Rust);
    }
    
    #[test]
    fn test_disabled_language() {
        let mut settings = Settings::default();
        // Disable Rust
        if let Some(rust_config) = settings.languages.get_mut("rust") {
            rust_config.enabled = false;
        }
        
        let factory = ParserFactory::new(Arc::new(settings));
        let result = factory.create_parser(Language::Rust);
        
        assert!(result.is_err());
        if let Err(err_msg) = result {
            assert!(err_msg.contains("disabled"));
        }
    }
    
    #[test]
    fn test_enabled_languages() {
        let settings = Arc::new(Settings::default());
        let factory = ParserFactory::new(settings);

        let enabled = factory.enabled_languages();
        // All seven languages are enabled by default
        assert_eq!(enabled.len(), 7);
        assert!(enabled.contains(&Language::Rust));
        assert!(enabled.contains(&Language::Go));
        assert!(enabled.contains(&Language::CSharp));
    }

    #[test]
    fn test_create_every_language_parser() {
        let settings = Arc::new(Settings::default());
        let factory = ParserFactory::new(settings);

        for &lang in Language::all() {
            let parser = factory.create_parser(lang).unwrap();
            assert_eq!(parser.language(), lang);
        }
    }
}