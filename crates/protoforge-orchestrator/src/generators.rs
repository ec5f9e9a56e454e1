// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generator registry: per-language toolchain configuration and
//! package-manifest synthesis.
//!
//! The registry is a static table built at construction time; nothing
//! mutates it at request time. Language dispatch goes through the closed
//! `Language` enum, so unsupported identifiers fail once at lookup
//! rather than in string branches scattered across the pipeline.
//!
//! Manifest synthesis is pure templating from `(module_name, version)`.
//! It performs no compilation and produces byte-identical output for
//! identical inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::types::GeneratedFile;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// The closed set of supported target languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Java,
    Rust,
    TypeScript,
    JavaScript,
    Ruby,
    Php,
    CSharp,
    Kotlin,
    Swift,
    ObjC,
    Dart,
    Scala,
    Cpp,
    C,
}

impl Language {
    /// Every supported language, in registry order.
    pub fn all() -> &'static [Language] {
        &[
            Language::Go,
            Language::Python,
            Language::Java,
            Language::Rust,
            Language::TypeScript,
            Language::JavaScript,
            Language::Ruby,
            Language::Php,
            Language::CSharp,
            Language::Kotlin,
            Language::Swift,
            Language::ObjC,
            Language::Dart,
            Language::Scala,
            Language::Cpp,
            Language::C,
        ]
    }

    /// Wire identifier used in requests and job ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::CSharp => "csharp",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::ObjC => "objc",
            Language::Dart => "dart",
            Language::Scala => "scala",
            Language::Cpp => "cpp",
            Language::C => "c",
        }
    }

    /// Parse a wire identifier. `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Language> {
        Language::all().iter().find(|l| l.as_str() == s).copied()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ToolchainSpec
// ---------------------------------------------------------------------------

/// Sandbox toolchain configuration for one target language.
#[derive(Debug, Clone)]
pub struct ToolchainSpec {
    /// Target language.
    pub language: Language,
    /// Sandbox toolchain image reference.
    pub image: String,
    /// protoc plugin binary (empty for builtin generators like cpp).
    pub plugin: String,
    /// protoc output flag (e.g. "--go_out").
    pub out_flag: String,
    /// gRPC plugin binary, if the language has a separate one.
    pub grpc_plugin: Option<String>,
    /// gRPC output flag (e.g. "--go-grpc_out").
    pub grpc_out_flag: Option<String>,
    /// Suffix of generated message files (e.g. ".pb.go"), used for
    /// diagnostics and by the mock sandbox.
    pub generated_suffix: String,
}

impl ToolchainSpec {
    /// Assemble the protoc argument list for one compile.
    ///
    /// Request options are forwarded as `key=value` parameters on the
    /// output flag, sorted for deterministic invocations.
    pub fn protoc_args(
        &self,
        input_dir: &str,
        output_dir: &str,
        include_grpc: bool,
        options: &HashMap<String, String>,
        proto_paths: &[String],
    ) -> Vec<String> {
        let mut args = vec![format!("-I{input_dir}")];

        let mut opts: Vec<(&String, &String)> = options.iter().collect();
        opts.sort_by(|a, b| a.0.cmp(b.0));
        let opt_params: Vec<String> = opts.iter().map(|(k, v)| format!("{k}={v}")).collect();

        if opt_params.is_empty() {
            args.push(format!("{}={}", self.out_flag, output_dir));
        } else {
            args.push(format!(
                "{}={}:{}",
                self.out_flag,
                opt_params.join(","),
                output_dir
            ));
        }

        if include_grpc {
            if let Some(grpc_flag) = &self.grpc_out_flag {
                args.push(format!("{grpc_flag}={output_dir}"));
            }
        }

        args.extend(proto_paths.iter().cloned());
        args
    }
}

// ---------------------------------------------------------------------------
// GeneratorRegistry
// ---------------------------------------------------------------------------

/// Static language -> toolchain table.
pub struct GeneratorRegistry {
    table: HashMap<Language, ToolchainSpec>,
}

impl GeneratorRegistry {
    /// Build a registry from an explicit table (dependency injection;
    /// there is no post-construction registration step).
    pub fn new(table: HashMap<Language, ToolchainSpec>) -> Self {
        GeneratorRegistry { table }
    }

    /// The full builtin table covering every `Language`.
    pub fn builtin() -> Self {
        let mut table = HashMap::new();
        for language in Language::all() {
            table.insert(*language, builtin_spec(*language));
        }
        GeneratorRegistry { table }
    }

    /// Resolve a language identifier to its toolchain spec.
    ///
    /// Unknown identifiers and languages absent from the injected table
    /// are a client error.
    pub fn lookup(&self, language: &str) -> Result<&ToolchainSpec, OrchestratorError> {
        Language::parse(language)
            .and_then(|l| self.table.get(&l))
            .ok_or_else(|| OrchestratorError::UnsupportedLanguage(language.to_string()))
    }

    /// Sorted wire identifiers of every registered language.
    pub fn supported_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.keys().map(|l| l.as_str().to_string()).collect();
        names.sort();
        names
    }
}

fn builtin_spec(language: Language) -> ToolchainSpec {
    let (image, plugin, out_flag, grpc_plugin, grpc_out_flag, suffix) = match language {
        Language::Go => (
            "protoforge/toolchain-go:1.22",
            "protoc-gen-go",
            "--go_out",
            Some("protoc-gen-go-grpc"),
            Some("--go-grpc_out"),
            ".pb.go",
        ),
        Language::Python => (
            "protoforge/toolchain-python:3.12",
            "protoc-gen-python",
            "--python_out",
            Some("grpc_python_plugin"),
            Some("--grpc_python_out"),
            "_pb2.py",
        ),
        Language::Java => (
            "protoforge/toolchain-java:21",
            "protoc-gen-java",
            "--java_out",
            Some("protoc-gen-grpc-java"),
            Some("--grpc-java_out"),
            ".java",
        ),
        Language::Rust => (
            "protoforge/toolchain-rust:1.79",
            "protoc-gen-prost",
            "--prost_out",
            Some("protoc-gen-tonic"),
            Some("--tonic_out"),
            ".rs",
        ),
        Language::TypeScript => (
            "protoforge/toolchain-node:20",
            "protoc-gen-ts",
            "--ts_out",
            None,
            None,
            ".ts",
        ),
        Language::JavaScript => (
            "protoforge/toolchain-node:20",
            "protoc-gen-js",
            "--js_out",
            Some("grpc_node_plugin"),
            Some("--grpc_out"),
            "_pb.js",
        ),
        Language::Ruby => (
            "protoforge/toolchain-ruby:3.3",
            "protoc-gen-ruby",
            "--ruby_out",
            Some("grpc_ruby_plugin"),
            Some("--grpc_out"),
            "_pb.rb",
        ),
        Language::Php => (
            "protoforge/toolchain-php:8.3",
            "protoc-gen-php",
            "--php_out",
            Some("grpc_php_plugin"),
            Some("--grpc_out"),
            ".php",
        ),
        Language::CSharp => (
            "protoforge/toolchain-dotnet:8",
            "protoc-gen-csharp",
            "--csharp_out",
            Some("grpc_csharp_plugin"),
            Some("--grpc_out"),
            ".cs",
        ),
        Language::Kotlin => (
            "protoforge/toolchain-jvm:21",
            "protoc-gen-kotlin",
            "--kotlin_out",
            None,
            None,
            ".kt",
        ),
        Language::Swift => (
            "protoforge/toolchain-swift:5.10",
            "protoc-gen-swift",
            "--swift_out",
            Some("protoc-gen-grpc-swift"),
            Some("--grpc-swift_out"),
            ".pb.swift",
        ),
        Language::ObjC => (
            "protoforge/toolchain-objc:15",
            "protoc-gen-objc",
            "--objc_out",
            None,
            None,
            ".pbobjc.m",
        ),
        Language::Dart => (
            "protoforge/toolchain-dart:3.4",
            "protoc-gen-dart",
            "--dart_out",
            None,
            None,
            ".pb.dart",
        ),
        Language::Scala => (
            "protoforge/toolchain-jvm:21",
            "protoc-gen-scala",
            "--scala_out",
            None,
            None,
            ".scala",
        ),
        Language::Cpp => (
            "protoforge/toolchain-cpp:17",
            "",
            "--cpp_out",
            Some("grpc_cpp_plugin"),
            Some("--grpc_out"),
            ".pb.cc",
        ),
        Language::C => (
            "protoforge/toolchain-c:13",
            "protoc-gen-c",
            "--c_out",
            None,
            None,
            ".pb-c.c",
        ),
    };

    ToolchainSpec {
        language,
        image: image.to_string(),
        plugin: plugin.to_string(),
        out_flag: out_flag.to_string(),
        grpc_plugin: grpc_plugin.map(str::to_string),
        grpc_out_flag: grpc_out_flag.map(str::to_string),
        generated_suffix: suffix.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Manifest synthesis
// ---------------------------------------------------------------------------

/// Synthesize the package-manifest files for one language.
///
/// Pure templating from `(module_name, version)`: same inputs always
/// produce byte-identical output.
pub fn synthesize_manifests(
    language: Language,
    module_name: &str,
    version: &str,
) -> Vec<GeneratedFile> {
    let semver = version.strip_prefix('v').unwrap_or(version);
    let ident = module_name.replace('-', "_");

    match language {
        Language::Go => vec![GeneratedFile::new(
            "go.mod",
            format!("module {module_name}\n\ngo 1.22\n"),
        )],
        Language::Python => vec![
            GeneratedFile::new(
                "setup.py",
                format!(
                    "from setuptools import setup, find_packages\n\nsetup(\n    name=\"{module_name}\",\n    version=\"{semver}\",\n    packages=find_packages(),\n    install_requires=[\"protobuf>=4.25\"],\n)\n"
                ),
            ),
            GeneratedFile::new(
                "pyproject.toml",
                format!(
                    "[build-system]\nrequires = [\"setuptools\"]\nbuild-backend = \"setuptools.build_meta\"\n\n[project]\nname = \"{module_name}\"\nversion = \"{semver}\"\ndependencies = [\"protobuf>=4.25\"]\n"
                ),
            ),
        ],
        Language::Java => vec![GeneratedFile::new(
            "pom.xml",
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n  <modelVersion>4.0.0</modelVersion>\n  <groupId>dev.protoforge</groupId>\n  <artifactId>{module_name}</artifactId>\n  <version>{semver}</version>\n  <dependencies>\n    <dependency>\n      <groupId>com.google.protobuf</groupId>\n      <artifactId>protobuf-java</artifactId>\n      <version>3.25.3</version>\n    </dependency>\n  </dependencies>\n</project>\n"
            ),
        )],
        Language::Rust => vec![GeneratedFile::new(
            "Cargo.toml",
            format!(
                "[package]\nname = \"{ident}\"\nversion = \"{semver}\"\nedition = \"2021\"\n\n[dependencies]\nprost = \"0.13\"\n"
            ),
        )],
        Language::TypeScript => vec![
            GeneratedFile::new(
                "package.json",
                format!(
                    "{{\n  \"name\": \"{module_name}\",\n  \"version\": \"{semver}\",\n  \"types\": \"index.d.ts\",\n  \"dependencies\": {{\n    \"google-protobuf\": \"^3.21.0\"\n  }}\n}}\n"
                ),
            ),
            GeneratedFile::new(
                "tsconfig.json",
                "{\n  \"compilerOptions\": {\n    \"target\": \"es2020\",\n    \"module\": \"commonjs\",\n    \"declaration\": true,\n    \"strict\": true\n  }\n}\n",
            ),
        ],
        Language::JavaScript => vec![GeneratedFile::new(
            "package.json",
            format!(
                "{{\n  \"name\": \"{module_name}\",\n  \"version\": \"{semver}\",\n  \"dependencies\": {{\n    \"google-protobuf\": \"^3.21.0\"\n  }}\n}}\n"
            ),
        )],
        Language::Ruby => vec![GeneratedFile::new(
            format!("{ident}.gemspec"),
            format!(
                "Gem::Specification.new do |s|\n  s.name = \"{module_name}\"\n  s.version = \"{semver}\"\n  s.summary = \"Generated protobuf types for {module_name}\"\n  s.files = Dir[\"lib/**/*.rb\"]\n  s.add_dependency \"google-protobuf\", \"~> 3.25\"\nend\n"
            ),
        )],
        Language::Php => vec![GeneratedFile::new(
            "composer.json",
            format!(
                "{{\n  \"name\": \"protoforge/{module_name}\",\n  \"version\": \"{semver}\",\n  \"require\": {{\n    \"google/protobuf\": \"^3.25\"\n  }},\n  \"autoload\": {{\n    \"psr-4\": {{ \"\": \"src/\" }}\n  }}\n}}\n"
            ),
        )],
        Language::CSharp => vec![GeneratedFile::new(
            format!("{ident}.csproj"),
            format!(
                "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <TargetFramework>net8.0</TargetFramework>\n    <PackageId>{module_name}</PackageId>\n    <Version>{semver}</Version>\n  </PropertyGroup>\n  <ItemGroup>\n    <PackageReference Include=\"Google.Protobuf\" Version=\"3.25.3\" />\n  </ItemGroup>\n</Project>\n"
            ),
        )],
        Language::Kotlin => vec![GeneratedFile::new(
            "build.gradle.kts",
            format!(
                "plugins {{\n    kotlin(\"jvm\") version \"2.0.0\"\n}}\n\ngroup = \"dev.protoforge\"\nversion = \"{semver}\"\n\ndependencies {{\n    implementation(\"com.google.protobuf:protobuf-kotlin:3.25.3\")\n}}\n"
            ),
        )],
        Language::Swift => vec![GeneratedFile::new(
            "Package.swift",
            format!(
                "// swift-tools-version:5.10\nimport PackageDescription\n\nlet package = Package(\n    name: \"{module_name}\",\n    products: [.library(name: \"{module_name}\", targets: [\"{module_name}\"])],\n    dependencies: [\n        .package(url: \"https://github.com/apple/swift-protobuf.git\", from: \"1.26.0\")\n    ],\n    targets: [.target(name: \"{module_name}\", dependencies: [.product(name: \"SwiftProtobuf\", package: \"swift-protobuf\")])]\n)\n"
            ),
        )],
        Language::ObjC => vec![GeneratedFile::new(
            format!("{ident}.podspec"),
            format!(
                "Pod::Spec.new do |s|\n  s.name = \"{module_name}\"\n  s.version = \"{semver}\"\n  s.summary = \"Generated protobuf types for {module_name}\"\n  s.source_files = \"*.{{h,m}}\"\n  s.dependency \"Protobuf\", \"~> 3.25\"\nend\n"
            ),
        )],
        Language::Dart => vec![GeneratedFile::new(
            "pubspec.yaml",
            format!(
                "name: {ident}\nversion: {semver}\nenvironment:\n  sdk: \">=3.0.0 <4.0.0\"\ndependencies:\n  protobuf: ^3.1.0\n"
            ),
        )],
        Language::Scala => vec![GeneratedFile::new(
            "build.sbt",
            format!(
                "name := \"{module_name}\"\nversion := \"{semver}\"\nscalaVersion := \"3.4.2\"\nlibraryDependencies += \"com.thesamet.scalapb\" %% \"scalapb-runtime\" % \"0.11.15\"\n"
            ),
        )],
        Language::Cpp => vec![GeneratedFile::new(
            "CMakeLists.txt",
            format!(
                "cmake_minimum_required(VERSION 3.20)\nproject({ident} VERSION {semver})\n\nfind_package(Protobuf REQUIRED)\nfile(GLOB GENERATED_SRCS \"*.pb.cc\")\nadd_library({ident} ${{GENERATED_SRCS}})\ntarget_link_libraries({ident} protobuf::libprotobuf)\n"
            ),
        )],
        Language::C => vec![GeneratedFile::new(
            "Makefile",
            format!(
                "# {module_name} {semver}\nCC ?= cc\nCFLAGS += -I. $(shell pkg-config --cflags libprotobuf-c)\nLDLIBS += $(shell pkg-config --libs libprotobuf-c)\n\nSRCS := $(wildcard *.pb-c.c)\nOBJS := $(SRCS:.c=.o)\n\nlib{ident}.a: $(OBJS)\n\tar rcs $@ $^\n"
            ),
        )],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
