#![deny(warnings)]
extern crate tempfile;
extern crate vk_bundle;

use std::path::{Path, PathBuf};

use vk_bundle::{
    ConfigError, DefinitionBundle, DocMap, Literal, NoDocs, Options, Output, Plan, Registry,
    ResolveError, ResolveMode, TypeKind,
};

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources/vk.xml")
}

fn load_fixture(options: &Options) -> Registry {
    vk_bundle::load_file(&fixture_path(), options).unwrap()
}

fn generate_fixture() -> Output {
    let options = Options::default();
    let registry = load_fixture(&options);
    vk_bundle::generate(&registry, &options, &NoDocs).unwrap()
}

fn bundle<'a>(output: &'a Output, name: &str) -> &'a DefinitionBundle {
    output
        .bundles
        .iter()
        .find(|b| b.name == name)
        .unwrap_or_else(|| panic!("no bundle named {}", name))
}

fn closure_names<'a>(plan: &'a Plan, unit: &str) -> Vec<&'a str> {
    plan.units()
        .find(|u| u.name == unit)
        .unwrap_or_else(|| panic!("no unit named {}", unit))
        .closure
        .iter()
        .collect()
}

//--------------------------------------------------------------------------------------------------
#[test]
fn fixture_loads() {
    let registry = load_fixture(&Options::default());

    assert_eq!(registry.vendor_ids.len(), 2);
    assert_eq!(registry.vendor_ids[0].id, 0x10001);
    assert_eq!(registry.platforms[0].protect, "VK_USE_PLATFORM_XLIB_KHR");

    // the vulkansc-only feature is filtered out
    let features: Vec<&str> = registry.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(features, vec!["VK_VERSION_1_0", "VK_VERSION_1_1"]);
    assert!(registry.command("vkGetFaultData").is_none());
    assert!(registry.type_named("VkFaultData").is_none());

    assert_eq!(
        registry.type_named("ANativeWindow").map(|t| &t.kind),
        Some(&TypeKind::PlatformOpaque { requires: None })
    );
    assert!(registry.elided.contains("PFN_vkVoidFunction"));
    assert!(registry.type_named("PFN_vkVoidFunction").is_none());

    let disabled = &registry.extensions[3];
    assert_eq!(disabled.name, "VK_NV_extension_99");
    assert!(!disabled.supported.is_supported("vulkan"));
    assert_eq!(registry.extensions[1].requires, vec!["VK_KHR_surface"]);
}

#[test]
fn api_selects_struct_variant() {
    let registry = load_fixture(&Options::default());
    match registry.type_named("VkExtent3D").map(|t| &t.kind) {
        Some(TypeKind::Struct(aggregate)) => {
            let members: Vec<&str> = aggregate.members.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(members, vec!["width", "height", "depth"]);
        }
        other => panic!("unexpected kind {:?}", other),
    }

    // member filtered by api
    match registry.type_named("VkPhysicalDeviceProperties").map(|t| &t.kind) {
        Some(TypeKind::Struct(aggregate)) => assert_eq!(aggregate.members.len(), 3),
        other => panic!("unexpected kind {:?}", other),
    }

    let options = Options {
        api: String::from("vulkansc"),
        ..Options::default()
    };
    let registry = load_fixture(&options);
    match registry.type_named("VkExtent3D").map(|t| &t.kind) {
        Some(TypeKind::Struct(aggregate)) => assert_eq!(aggregate.members.len(), 2),
        other => panic!("unexpected kind {:?}", other),
    }
    let features: Vec<&str> = registry.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(features, vec!["VK_VERSION_1_0", "VKSC_VERSION_1_0"]);
}

#[test]
fn command_alias_is_materialized() {
    let registry = load_fixture(&Options::default());
    let alias = registry.command("vkGetPhysicalDeviceProperties2KHR").unwrap();
    let target = registry.command("vkGetPhysicalDeviceProperties2").unwrap();
    assert_eq!(alias.name(), "vkGetPhysicalDeviceProperties2KHR");
    assert_eq!(alias.alias_of.as_deref(), Some("vkGetPhysicalDeviceProperties2"));
    assert_eq!(alias.params, target.params);
    assert_eq!(alias.return_type(), "void");
}

//--------------------------------------------------------------------------------------------------
#[test]
fn core_closure_order() {
    let options = Options::default();
    let registry = load_fixture(&options);
    let plan = Plan::new(&registry, &options).unwrap();

    assert_eq!(
        closure_names(&plan, "VK_VERSION_1_0"),
        vec![
            "vk_platform",
            "VK_API_VERSION_1_0",
            "VkBool32",
            "VkFlags",
            "VkDeviceSize",
            "VkFence",
            "VkStructureType",
            "VkBaseOutStructure",
            "float",
            "int32_t",
            "uint32_t",
            "VkClearColorValue",
            "VkResult",
            "void",
            "VkInstanceCreateFlags",
            "char",
            "VkApplicationInfo",
            "VkInstanceCreateInfo",
            "PFN_vkAllocationFunction",
            "size_t",
            "VkAllocationCallbacks",
            "VkInstance",
            "VkPhysicalDevice",
            "VkQueueFlags",
            "VkQueueFamilyProperties",
            "VkCommandBuffer",
        ]
    );
    assert_eq!(
        closure_names(&plan, "VK_VERSION_1_1"),
        vec![
            "VkExtent3D",
            "uint8_t",
            "VkPhysicalDeviceProperties",
            "VkPhysicalDeviceProperties2",
        ]
    );
}

#[test]
fn extension_closures_exclude_core_types() {
    let options = Options::default();
    let registry = load_fixture(&options);
    let plan = Plan::new(&registry, &options).unwrap();

    assert_eq!(
        closure_names(&plan, "VK_KHR_surface"),
        vec![
            "VkSurfaceKHR",
            "VkSurfaceTransformFlagBitsKHR",
            "VkPresentModeKHR",
            "VkSurfaceTransformFlagsKHR",
            "VkExtent2D",
            "VkSurfaceCapabilitiesKHR",
        ]
    );
    assert_eq!(
        closure_names(&plan, "VK_KHR_xlib_surface"),
        vec![
            "VkXlibSurfaceCreateFlagsKHR",
            "Display",
            "Window",
            "VkXlibSurfaceCreateInfoKHR",
            "VkSurfaceKHR",
        ]
    );
    assert_eq!(
        closure_names(&plan, "VK_KHR_get_physical_device_properties2"),
        vec!["VkPhysicalDeviceProperties2KHR"]
    );

    for name in plan.extension_types.iter() {
        assert!(!plan.core_types.contains(name), "{} is in both tables", name);
    }
    assert_eq!(plan.extension_types.len(), 11);
}

#[test]
fn closures_are_post_ordered() {
    let options = Options::default();
    let registry = load_fixture(&options);
    let plan = Plan::new(&registry, &options).unwrap();

    for unit in plan.units() {
        let names: Vec<&str> = unit.closure.iter().collect();
        for (position, name) in names.iter().enumerate() {
            let members = match registry.type_named(name).map(|t| &t.kind) {
                Some(TypeKind::Struct(aggregate)) | Some(TypeKind::Union(aggregate)) => {
                    &aggregate.members
                }
                _ => continue,
            };
            for member in members {
                if let Some(member_position) =
                    names.iter().position(|n| *n == member.type_name.as_str())
                {
                    assert!(
                        member_position <= position,
                        "{} precedes its member type {}",
                        name,
                        member.type_name
                    );
                }
            }
        }
    }
}

#[test]
fn resolution_is_idempotent() {
    let options = Options::default();
    let registry = load_fixture(&options);
    let first = Plan::new(&registry, &options).unwrap();
    let second = Plan::new(&registry, &options).unwrap();
    assert_eq!(first.core_types, second.core_types);
    assert_eq!(first.extension_types, second.extension_types);
}

#[test]
fn disabled_extension_is_not_planned() {
    let options = Options {
        mode: ResolveMode::Strict,
        ..Options::default()
    };
    let registry = load_fixture(&options);
    let plan = Plan::new(&registry, &options).unwrap();
    assert!(plan.units().all(|u| u.name != "VK_NV_extension_99"));
    // its undefined type is never looked at
    assert!(plan.diagnostics().unresolved_references().is_empty());
}

//--------------------------------------------------------------------------------------------------
#[test]
fn core_bundle_contents() {
    let output = generate_fixture();
    let names: Vec<&str> = output.bundles.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "VK_VERSION_1_0",
            "VK_VERSION_1_1",
            "VK_KHR_surface",
            "VK_KHR_xlib_surface",
            "VK_KHR_get_physical_device_properties2",
        ]
    );

    let core = bundle(&output, "VK_VERSION_1_0");
    assert!(!core.extension);

    let constants: Vec<(&str, &Literal)> = core
        .constants
        .iter()
        .map(|c| (c.name.as_str(), &c.value))
        .collect();
    assert_eq!(
        constants,
        vec![
            ("VK_MAX_PHYSICAL_DEVICE_NAME_SIZE", &Literal::Int(String::from("256"))),
            ("VK_UUID_SIZE", &Literal::Int(String::from("16"))),
            ("VK_LOD_CLAMP_NONE", &Literal::Float(String::from("1000.0"))),
            ("VK_REMAINING_MIP_LEVELS", &Literal::Int(String::from("(~0)"))),
            ("VK_WHOLE_SIZE", &Literal::Wide(String::from("(~0)"))),
            ("VK_TRUE", &Literal::Int(String::from("1"))),
            ("VK_FALSE", &Literal::Int(String::from("0"))),
        ]
    );

    let enums: Vec<&str> = core.enums.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(enums, vec!["VkStructureType", "VkResult"]);
    let results: Vec<&str> = core.enums[1].values.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(
        results,
        vec!["VK_SUCCESS", "VK_NOT_READY", "VK_ERROR_OUT_OF_HOST_MEMORY"]
    );

    assert_eq!(core.bitmasks.len(), 1);
    let queue_flags = &core.bitmasks[0];
    assert_eq!(queue_flags.name, "VkQueueFlags");
    assert_eq!(queue_flags.group.as_deref(), Some("VkQueueFlagBits"));
    let masks: Vec<&Literal> = queue_flags.values.iter().map(|v| &v.value).collect();
    assert_eq!(
        masks,
        vec![
            &Literal::Mask(String::from("0x00000001")),
            &Literal::Mask(String::from("0x00000002")),
            &Literal::Mask(String::from("0x00000004")),
        ]
    );

    let commands: Vec<(&str, bool)> = core
        .commands
        .iter()
        .map(|c| (c.name.as_str(), c.global))
        .collect();
    assert_eq!(
        commands,
        vec![
            ("vkCreateInstance", true),
            ("vkDestroyInstance", false),
            ("vkEnumeratePhysicalDevices", false),
            ("vkGetPhysicalDeviceQueueFamilyProperties", false),
            ("vkGetInstanceProcAddr", false),
            ("vkCmdSetBlendConstants", false),
        ]
    );

    let create = &core.commands[0];
    assert_eq!(create.return_type.type_name, "VkResult");
    assert_eq!(create.success_codes, vec!["VK_SUCCESS"]);
    assert_eq!(create.params[0].modifier.as_deref(), Some("const"));
    assert_eq!(create.params[0].indirection, "ptr");
    assert!(create.params[1].optional);
    assert!(create.queues.is_empty());
    assert_eq!(create.render_pass, None);

    let blend = &core.commands[5];
    assert_eq!(blend.queues, vec!["graphics"]);
    assert_eq!(blend.render_pass.as_deref(), Some("both"));
    assert_eq!(blend.cmd_buffer_level, vec!["primary", "secondary"]);
    assert_eq!(
        blend.implicit_extern_sync_params,
        vec!["the sname:VkCommandPool that pname:commandBuffer was allocated from"]
    );
    assert_eq!(blend.params[0].extern_sync.as_deref(), Some("true"));
    assert_eq!(blend.params[1].array, vec!["4"]);
}

#[test]
fn extension_bundle_values() {
    let output = generate_fixture();

    let promoted = bundle(&output, "VK_VERSION_1_1");
    assert_eq!(promoted.enum_extensions.len(), 1);
    assert_eq!(promoted.enum_extensions[0].extends, "VkStructureType");
    assert_eq!(
        promoted.enum_extensions[0].value,
        Literal::Int(String::from("1000059001"))
    );

    let surface = bundle(&output, "VK_KHR_surface");
    assert!(surface.extension);
    assert_eq!(
        surface.constants[1].value,
        Literal::Text(String::from("VK_KHR_surface"))
    );
    assert_eq!(surface.enum_extensions[0].name, "VK_ERROR_SURFACE_LOST_KHR");
    assert_eq!(
        surface.enum_extensions[0].value,
        Literal::Int(String::from("-1000000000"))
    );
    let enums: Vec<&str> = surface.enums.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(enums, vec!["VkPresentModeKHR"]);
    // reachable from both the flag bits and the flags type, emitted once
    assert_eq!(surface.bitmasks.len(), 1);
    assert_eq!(surface.bitmasks[0].name, "VkSurfaceTransformFlagBitsKHR");

    let xlib = bundle(&output, "VK_KHR_xlib_surface");
    assert_eq!(
        xlib.enum_extensions[0].value,
        Literal::Int(String::from("1000004000"))
    );
    assert!(!xlib.commands[0].global);

    let props2 = bundle(&output, "VK_KHR_get_physical_device_properties2");
    assert_eq!(
        props2.enum_extensions[0].value,
        Literal::Alias(String::from("VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_PROPERTIES_2"))
    );
    assert_eq!(
        props2.commands[0].alias_of.as_deref(),
        Some("vkGetPhysicalDeviceProperties2")
    );
}

#[test]
fn type_tables() {
    let output = generate_fixture();
    let core = &output.core_types;

    let handles: Vec<(&str, bool)> = core
        .handles
        .iter()
        .map(|h| (h.name.as_str(), h.dispatchable))
        .collect();
    assert_eq!(
        handles,
        vec![
            ("VkFence", false),
            ("VkInstance", true),
            ("VkPhysicalDevice", true),
            ("VkCommandBuffer", true),
        ]
    );

    let base_types: Vec<(&str, &str)> = core
        .base_types
        .iter()
        .map(|t| (t.name.as_str(), t.underlying.as_str()))
        .collect();
    assert_eq!(
        base_types,
        vec![("VkBool32", "u32"), ("VkFlags", "u32"), ("VkDeviceSize", "u64")]
    );

    let union = core
        .structs
        .iter()
        .find(|s| s.name == "VkClearColorValue")
        .unwrap();
    assert!(union.union);
    assert_eq!(union.members[0].type_name, "f32");
    assert_eq!(union.members[0].array, vec!["4"]);

    let create_info = core
        .structs
        .iter()
        .find(|s| s.name == "VkInstanceCreateInfo")
        .unwrap();
    let layers = &create_info.members[5];
    assert_eq!(layers.name, "ppEnabledLayerNames");
    assert_eq!(layers.type_name, "c_char");
    assert_eq!(layers.indirection, "ptr_const_ptr");
    assert_eq!(layers.len, vec!["enabledLayerCount", "null-terminated"]);
    let next = &create_info.members[1];
    assert_eq!(
        next.valid_extension_structs,
        vec!["VkDebugReportCallbackCreateInfoEXT", "VkValidationFlagsEXT"]
    );
    assert!(!next.no_auto_validity);

    let callbacks = core
        .structs
        .iter()
        .find(|s| s.name == "VkAllocationCallbacks")
        .unwrap();
    assert!(!callbacks.members[0].no_auto_validity);
    assert!(callbacks.members[1].no_auto_validity);
    assert!(callbacks.members[1].valid_extension_structs.is_empty());

    let allocation = &core.function_pointers[0];
    assert_eq!(allocation.name, "PFN_vkAllocationFunction");
    assert_eq!(allocation.return_type.indirection, "ptr");
    let params: Vec<&str> = allocation.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["pUserData", "size", "alignment"]);
    assert_eq!(allocation.params[1].type_name, "usize");

    let extensions = &output.extension_types;
    assert_eq!(extensions.aliases[0].name, "VkPhysicalDeviceProperties2KHR");
    assert_eq!(extensions.aliases[0].underlying, "VkPhysicalDeviceProperties2");
    let platform: Vec<&str> = extensions
        .platform_types
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(platform, vec!["Display", "Window"]);
    assert_eq!(
        extensions.enum_tags,
        vec!["VkSurfaceTransformFlagBitsKHR", "VkPresentModeKHR"]
    );

    let properties = output
        .core_types
        .structs
        .iter()
        .find(|s| s.name == "VkPhysicalDeviceProperties")
        .unwrap();
    assert_eq!(properties.members[1].array, vec!["VK_MAX_PHYSICAL_DEVICE_NAME_SIZE"]);
    assert!(properties.returned_only);
}

#[test]
fn substitutions_are_tracked() {
    let output = generate_fixture();
    let unused = vk_bundle::subst::unused(&output.diagnostics);
    assert!(unused.contains(&"double"));
    assert!(!unused.contains(&"uint32_t"));
    assert!(!unused.contains(&"size_t"));
}

#[test]
fn docs_are_attached() {
    let options = Options::default();
    let registry = load_fixture(&options);
    let mut docs = DocMap::new();
    docs.insert_command("vkCreateInstance", "Create a new Vulkan instance.");
    docs.insert_struct("VkApplicationInfo", "Structure specifying application information.");

    let output = vk_bundle::generate(&registry, &options, &docs).unwrap();
    let core = bundle(&output, "VK_VERSION_1_0");
    assert_eq!(
        core.commands[0].doc.as_deref(),
        Some("Create a new Vulkan instance.")
    );
    assert_eq!(core.commands[1].doc, None);
    let info = output
        .core_types
        .structs
        .iter()
        .find(|s| s.name == "VkApplicationInfo")
        .unwrap();
    assert!(info.doc.is_some());
}

//--------------------------------------------------------------------------------------------------
const DANGLING: &str = r#"<registry>
    <types>
        <type requires="vk_platform" name="uint32_t"/>
        <type category="struct" name="VkHolder">
            <member><type>uint32_t</type> <name>count</name></member>
            <member><type>VkMissing</type> <name>missing</name></member>
        </type>
    </types>
    <feature api="vulkan" name="VK_VERSION_1_0" number="1.0">
        <require>
            <type name="VkHolder"/>
            <enum name="VK_UNDEFINED_CONSTANT"/>
            <command name="vkMissing"/>
        </require>
    </feature>
</registry>"#;

#[test]
fn lenient_mode_records_dangling_references() {
    let options = Options::default();
    let registry = vk_bundle::load_stream(DANGLING.as_bytes(), &options).unwrap();
    let output = vk_bundle::generate(&registry, &options, &NoDocs).unwrap();

    let core = bundle(&output, "VK_VERSION_1_0");
    assert!(core.commands.is_empty());
    assert!(core.constants.is_empty());
    let names: Vec<&str> = output.core_types.structs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["VkHolder"]);

    let mut unresolved: Vec<(&str, &str)> = output
        .diagnostics
        .unresolved_references()
        .iter()
        .map(|r| (r.name.as_str(), r.referrer.as_str()))
        .collect();
    unresolved.sort();
    assert_eq!(
        unresolved,
        vec![
            ("VK_UNDEFINED_CONSTANT", "VK_VERSION_1_0"),
            ("VkMissing", "VkHolder"),
            ("vkMissing", "VK_VERSION_1_0"),
        ]
    );
}

#[test]
fn strict_mode_rejects_dangling_references() {
    let options = Options {
        mode: ResolveMode::Strict,
        ..Options::default()
    };
    let registry = vk_bundle::load_stream(DANGLING.as_bytes(), &options).unwrap();
    match vk_bundle::generate(&registry, &options, &NoDocs) {
        Err(ResolveError::Unresolved(refs)) => {
            assert!(refs.iter().any(|r| r.name == "VkMissing" && r.referrer == "VkHolder"));
        }
        other => panic!("unexpected result {:?}", other.map(|o| o.bundles.len())),
    }
}

#[test]
fn strict_mode_rejects_undefined_constants() {
    let xml = r#"<registry>
    <feature api="vulkan" name="VK_VERSION_1_0" number="1.0">
        <require>
            <enum name="VK_UNDEFINED_CONSTANT"/>
        </require>
    </feature>
</registry>"#;
    let lenient = Options::default();
    let registry = vk_bundle::load_stream(xml.as_bytes(), &lenient).unwrap();
    assert!(vk_bundle::generate(&registry, &lenient, &NoDocs).is_ok());

    let strict = Options {
        mode: ResolveMode::Strict,
        ..Options::default()
    };
    match vk_bundle::generate(&registry, &strict, &NoDocs) {
        Err(ResolveError::Unresolved(refs)) => {
            let refs: Vec<(&str, &str)> = refs
                .iter()
                .map(|r| (r.name.as_str(), r.referrer.as_str()))
                .collect();
            assert_eq!(refs, vec![("VK_UNDEFINED_CONSTANT", "VK_VERSION_1_0")]);
        }
        other => panic!("unexpected result {:?}", other.map(|o| o.bundles.len())),
    }
}

//--------------------------------------------------------------------------------------------------
fn source_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("xml")).unwrap();
    std::fs::copy(fixture_path(), root.path().join(vk_bundle::config::REGISTRY_FILE)).unwrap();
    root
}

#[test]
fn config_validation() {
    let source = source_root();
    let dest = tempfile::tempdir().unwrap();

    let config = vk_bundle::Config::new(source.path(), dest.path(), Options::default());
    config.validate().unwrap();

    let config = vk_bundle::Config::new(dest.path(), dest.path(), Options::default());
    match config.validate() {
        Err(ConfigError::MissingRegistry(path)) => assert!(path.ends_with("xml/vk.xml")),
        other => panic!("unexpected result {:?}", other),
    }

    let file = dest.path().join("not_a_dir");
    std::fs::write(&file, b"").unwrap();
    let config = vk_bundle::Config::new(source.path(), &file, Options::default());
    match config.validate() {
        Err(ConfigError::NotADirectory(path)) => assert_eq!(path, file),
        other => panic!("unexpected result {:?}", other),
    }

    let missing = dest.path().join("missing");
    let config = vk_bundle::Config::new(source.path(), &missing, Options::default());
    match config.validate() {
        Err(ConfigError::NotADirectory(_)) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn output_is_deterministic() {
    let output = generate_fixture();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let written = vk_bundle::write_output(first.path(), &output).unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "VK_VERSION_1_0.ron",
            "VK_VERSION_1_1.ron",
            "VK_KHR_surface.ron",
            "VK_KHR_xlib_surface.ron",
            "VK_KHR_get_physical_device_properties2.ron",
            "core_types.ron",
            "extension_types.ron",
        ]
    );

    // a fresh load must produce byte-identical files
    let regenerated = generate_fixture();
    vk_bundle::write_output(second.path(), &regenerated).unwrap();
    for name in &names {
        let a = std::fs::read(first.path().join(name)).unwrap();
        let b = std::fs::read(second.path().join(name)).unwrap();
        assert!(a == b, "{} differs between runs", name);
    }

    let core = std::fs::read_to_string(first.path().join("VK_VERSION_1_0.ron")).unwrap();
    assert!(core.contains("name: \"VK_VERSION_1_0\""));
    assert!(core.contains("Mask(\"0x00000004\")"));
    assert!(core.contains("Wide(\"(~0)\")"));
}
