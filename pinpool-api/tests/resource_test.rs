use pinpool_api::errors::ResourceError;
use pinpool_api::resource::{ClosureFactory, ResourceFactory};
use std::error::Error;

#[derive(Debug, PartialEq)]
struct Counter {
    index: usize,
    hits: u32,
}

#[test]
fn test_closure_factory_lifecycle() {
    let factory = ClosureFactory::new(|index| Ok(Counter { index, hits: 0 }));

    let transit = factory.create(3).unwrap();
    let mut resource = factory.bind(transit).unwrap();
    resource.hits += 1;

    let transit = factory.unbind(resource);
    assert_eq!(transit, Counter { index: 3, hits: 1 });
    factory.release(transit);
}

#[test]
fn test_closure_factory_propagates_creation_error() {
    let factory = ClosureFactory::new(|index| {
        if index == 1 {
            Err(ResourceError::Creation("license limit reached".to_string()))
        } else {
            Ok(index)
        }
    });

    assert_eq!(factory.create(0).unwrap(), 0);
    let err = factory.create(1).unwrap_err();
    assert_eq!(err.to_string(), "Resource creation failed: license limit reached");
}

#[test]
fn test_resource_error_display() {
    assert_eq!(
        ResourceError::Transfer("stream mismatch".to_string()).to_string(),
        "Resource transfer failed: stream mismatch"
    );
    let other = ResourceError::Other(anyhow::anyhow!("engine crashed"));
    assert!(other.to_string().contains("engine crashed"));
    assert!(ResourceError::Creation("x".to_string()).source().is_none());
}
